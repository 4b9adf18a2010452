// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/simple_letterbox.rs - 图像 letterbox 预处理
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use shanan_post::{model::DEFAULT_INPUT_SIZE, preprocess::letterbox};
use tracing::info;

/// 把图像 letterbox 到模型输入尺寸
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像
  #[arg(long, value_name = "IMAGE")]
  pub input: PathBuf,
  /// 输出图像
  #[arg(long, value_name = "OUTPUT")]
  pub output: PathBuf,
  /// 模型输入尺寸
  #[arg(long, value_name = "SIZE", default_value_t = DEFAULT_INPUT_SIZE)]
  pub size: u32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let image = image::open(&args.input)?.to_rgb8();
  info!("读取图像 {}: {}x{}", args.input.display(), image.width(), image.height());

  let boxed = letterbox(&image, args.size)?;
  let params = &boxed.params;
  info!(
    "缩放 {:.4}, 填充 ({:.1}, {:.1})",
    params.scale(),
    params.pad_x(),
    params.pad_y()
  );

  if let Some(parent) = args.output.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  boxed.image.save(&args.output)?;
  info!("已保存到 {}", args.output.display());

  Ok(())
}

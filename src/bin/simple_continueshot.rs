// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/simple_continueshot.rs - 连续帧后处理
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_post::{
  FromUrl,
  input::InputWrapper,
  model::PostprocessBuilder,
  output::OutputWrapper,
  task::{ContinuousTask, LatestFrameTask, Task},
};
use tracing::info;

/// Shanan 后处理参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 后处理配置，例如 yolo:///labels.txt?shape=1,85,8400
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  /// 每处理一帧后跳过的帧数
  #[arg(long, value_name = "SKIP", default_value_t = 0)]
  pub skip: usize,

  /// 后台线程处理，忙时丢弃新帧
  #[arg(long)]
  pub latest: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型配置: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let model = PostprocessBuilder::from_url(&args.model)?.build()?;
  let output = OutputWrapper::from_url(&args.output)?;

  if args.latest {
    let input = input.take(args.frame_number.unwrap_or(usize::MAX));
    LatestFrameTask.run_task(input, model, output)?;
  } else {
    ContinuousTask::default()
      .with_frame_number(args.frame_number)
      .with_skip(args.skip)
      .run_task(input, model, output)?;
  }

  Ok(())
}

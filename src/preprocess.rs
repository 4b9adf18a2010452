// 该文件是 Shanan （山南西风） 项目的一部分。
// src/preprocess.rs - 图像 letterbox 预处理
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

use image::{
  Rgb, RgbImage,
  imageops::{self, FilterType},
};
use tracing::debug;

use crate::{frame::FrameError, letterbox::LetterboxParams};

pub const PAD_VALUE: u8 = 114;

/// letterbox 之后的模型输入
pub struct Letterboxed {
  pub image: RgbImage,
  pub params: LetterboxParams,
}

impl Letterboxed {
  /// NHWC，RGB 顺序，归一化到 [0, 1]
  pub fn to_nhwc_tensor(&self) -> Vec<f32> {
    self
      .image
      .as_raw()
      .iter()
      .map(|&v| v as f32 / 255.0)
      .collect()
  }
}

/// 等比缩放后居中放到灰色 S x S 画布上
pub fn letterbox(image: &RgbImage, input_size: u32) -> Result<Letterboxed, FrameError> {
  let params = LetterboxParams::new(image.width() as f32, image.height() as f32, input_size)?;
  let (new_w, new_h) = params.scaled_size();
  let new_w = new_w.clamp(1, input_size);
  let new_h = new_h.clamp(1, input_size);

  let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);
  let mut canvas = RgbImage::from_pixel(input_size, input_size, Rgb([PAD_VALUE; 3]));
  let x = params.pad_x().floor() as i64;
  let y = params.pad_y().floor() as i64;
  imageops::overlay(&mut canvas, &resized, x, y);

  debug!(
    "letterbox: {}x{} -> {}x{}, 偏移 ({}, {})",
    image.width(),
    image.height(),
    new_w,
    new_h,
    x,
    y
  );
  Ok(Letterboxed {
    image: canvas,
    params,
  })
}

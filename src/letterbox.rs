// 该文件是 Shanan （山南西风） 项目的一部分。
// src/letterbox.rs - 等比缩放与填充变换
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

use crate::{detection::Detection, frame::FrameError};

fn valid_extent(v: f32) -> bool {
  v.is_finite() && v > 0.0
}

/// 把源图像放入 S x S 正方形输入的缩放与填充参数
///
/// 每帧计算一次，之后只读。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxParams {
  scale: f32,
  pad_x: f32,
  pad_y: f32,
  source_width: f32,
  source_height: f32,
  input_size: u32,
}

impl LetterboxParams {
  pub fn new(source_width: f32, source_height: f32, input_size: u32) -> Result<Self, FrameError> {
    if !valid_extent(source_width) || !valid_extent(source_height) || input_size == 0 {
      return Err(FrameError::InvalidGeometry {
        width: source_width,
        height: source_height,
      });
    }

    let size = input_size as f32;
    let scale = size / source_width.max(source_height);
    let new_w = (source_width * scale).round();
    let new_h = (source_height * scale).round();

    Ok(Self {
      scale,
      pad_x: (size - new_w) / 2.0,
      pad_y: (size - new_h) / 2.0,
      source_width,
      source_height,
      input_size,
    })
  }

  pub fn scale(&self) -> f32 {
    self.scale
  }

  pub fn pad_x(&self) -> f32 {
    self.pad_x
  }

  pub fn pad_y(&self) -> f32 {
    self.pad_y
  }

  pub fn source_width(&self) -> f32 {
    self.source_width
  }

  pub fn source_height(&self) -> f32 {
    self.source_height
  }

  pub fn input_size(&self) -> u32 {
    self.input_size
  }

  /// 缩放后（未填充）的图像尺寸
  pub fn scaled_size(&self) -> (u32, u32) {
    (
      (self.source_width * self.scale).round() as u32,
      (self.source_height * self.scale).round() as u32,
    )
  }

  /// 源图像坐标 -> 模型输入坐标
  pub fn to_model(&self, x: f32, y: f32) -> (f32, f32) {
    (x * self.scale + self.pad_x, y * self.scale + self.pad_y)
  }

  /// 模型输入坐标 -> 源图像坐标
  pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
    ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
  }
}

/// 渲染端把源图像坐标映射到自身视图的参数
///
/// 与解码用的 [`LetterboxParams`] 相互独立，视图可以不是正方形。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewMapping {
  scale: f32,
  pad_x: f32,
  pad_y: f32,
}

impl ViewMapping {
  pub fn fit(
    source_width: f32,
    source_height: f32,
    view_width: f32,
    view_height: f32,
  ) -> Result<Self, FrameError> {
    if !valid_extent(source_width) || !valid_extent(source_height) {
      return Err(FrameError::InvalidGeometry {
        width: source_width,
        height: source_height,
      });
    }
    if !valid_extent(view_width) || !valid_extent(view_height) {
      return Err(FrameError::InvalidGeometry {
        width: view_width,
        height: view_height,
      });
    }

    let scale = (view_width / source_width).min(view_height / source_height);
    Ok(Self {
      scale,
      pad_x: (view_width - source_width * scale) / 2.0,
      pad_y: (view_height - source_height * scale) / 2.0,
    })
  }

  pub fn scale(&self) -> f32 {
    self.scale
  }

  pub fn pad_x(&self) -> f32 {
    self.pad_x
  }

  pub fn pad_y(&self) -> f32 {
    self.pad_y
  }

  pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
    (x * self.scale + self.pad_x, y * self.scale + self.pad_y)
  }

  /// [left, top, right, bottom]，视图坐标
  pub fn map(&self, detection: &Detection) -> [f32; 4] {
    let (l, t) = self.map_point(detection.left(), detection.top());
    let (r, b) = self.map_point(detection.right(), detection.bottom());
    [l, t, r, b]
  }
}

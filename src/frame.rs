// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 原始输出帧定义
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

use thiserror::Error;

/// 单帧处理错误，只影响当前帧
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
  #[error("图像尺寸无效: {width}x{height}")]
  InvalidGeometry { width: f32, height: f32 },
  #[error("张量长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  TensorShapeMismatch { expected: usize, actual: usize },
}

/// 推理输出的一帧：原始张量以及源图像尺寸
///
/// 张量缓冲区由帧独占。把帧移交给后处理即移交缓冲区所有权，
/// 推理端在解码完成之前无法复用或覆盖它。
#[derive(Debug, Clone)]
pub struct RawFrame {
  tensor: Box<[f32]>,
  width: f32,
  height: f32,
}

impl RawFrame {
  pub fn new(tensor: impl Into<Box<[f32]>>, width: f32, height: f32) -> Self {
    Self {
      tensor: tensor.into(),
      width,
      height,
    }
  }

  pub fn tensor(&self) -> &[f32] {
    &self.tensor
  }

  pub fn width(&self) -> f32 {
    self.width
  }

  pub fn height(&self) -> f32 {
    self.height
  }

  /// 取回缓冲区，供推理端复用
  pub fn into_tensor(self) -> Box<[f32]> {
    self.tensor
  }
}

impl AsRef<[f32]> for RawFrame {
  fn as_ref(&self) -> &[f32] {
    &self.tensor
  }
}

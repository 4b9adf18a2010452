// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/meta.rs - 模型输出张量元信息
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

use std::str::FromStr;

use tracing::{debug, error};

use super::ModelError;

/// 每个框的固定通道：cx, cy, w, h, objectness
pub(crate) const BOX_CHANNELS: usize = 5;

/// 输出张量的内存排布
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
  /// [channel][box]，同一通道的值连续
  ChannelMajor,
  /// [box][channel]，同一个框的值连续
  BoxMajor,
}

impl TensorLayout {
  /// 返回 (框步长, 通道步长)，元素下标 = box * 框步长 + channel * 通道步长
  pub fn strides(self, num_boxes: usize, channels: usize) -> (usize, usize) {
    match self {
      TensorLayout::ChannelMajor => (1, num_boxes),
      TensorLayout::BoxMajor => (channels, 1),
    }
  }
}

impl FromStr for TensorLayout {
  type Err = ModelError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "channel-major" | "chw" | "nchw" => Ok(TensorLayout::ChannelMajor),
      "box-major" | "hwc" | "nhwc" => Ok(TensorLayout::BoxMajor),
      _ => Err(ModelError::query("layout", s)),
    }
  }
}

/// 框坐标的单位约定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoxUnits {
  /// 四个值都不超过 1.0 时视为归一化坐标
  #[default]
  Auto,
  Normalized,
  Pixels,
}

impl FromStr for BoxUnits {
  type Err = ModelError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "auto" => Ok(BoxUnits::Auto),
      "normalized" | "norm" => Ok(BoxUnits::Normalized),
      "pixels" | "pixel" | "px" => Ok(BoxUnits::Pixels),
      _ => Err(ModelError::query("units", s)),
    }
  }
}

/// 模型加载时确定的输出元信息，会话期间不变
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelMeta {
  layout: TensorLayout,
  num_boxes: usize,
  num_classes: usize,
  input_size: u32,
  units: BoxUnits,
}

impl ModelMeta {
  pub fn new(layout: TensorLayout, num_boxes: usize, num_classes: usize, input_size: u32) -> Self {
    Self {
      layout,
      num_boxes,
      num_classes,
      input_size,
      units: BoxUnits::Auto,
    }
  }

  /// 根据声明的输出形状判断排布
  ///
  /// 支持 [1, C, N], [1, N, C], [C, N], [N, C]，其中 C = 类别数 + 5。
  /// 第一维等于 C 时为通道优先。
  pub fn from_shape(shape: &[usize], num_classes: usize, input_size: u32) -> Result<Self, ModelError> {
    let channels = num_classes + BOX_CHANNELS;
    let unsupported = || ModelError::UnsupportedShape {
      shape: shape.to_vec(),
      channels,
    };

    let dims = match shape {
      [1, a, b] | [a, b] => (*a, *b),
      _ => {
        error!("输出形状维数不支持: {:?}", shape);
        return Err(unsupported());
      }
    };

    let (layout, num_boxes) = match dims {
      (c, n) if c == channels => (TensorLayout::ChannelMajor, n),
      (n, c) if c == channels => (TensorLayout::BoxMajor, n),
      _ => {
        error!(
          "输出形状 {:?} 与类别数 {} 不匹配（期望通道数 {}）",
          shape, num_classes, channels
        );
        return Err(unsupported());
      }
    };

    let meta = Self::new(layout, num_boxes, num_classes, input_size);
    if meta.checked_len().is_none() {
      error!("输出形状 {:?} 的元素个数溢出", shape);
      return Err(unsupported());
    }

    debug!("输出排布: {:?}, 框数量: {}", layout, num_boxes);
    Ok(meta)
  }

  pub fn with_units(mut self, units: BoxUnits) -> Self {
    self.units = units;
    self
  }

  pub fn layout(&self) -> TensorLayout {
    self.layout
  }

  pub fn num_boxes(&self) -> usize {
    self.num_boxes
  }

  pub fn num_classes(&self) -> usize {
    self.num_classes
  }

  pub fn input_size(&self) -> u32 {
    self.input_size
  }

  pub fn units(&self) -> BoxUnits {
    self.units
  }

  pub fn channels(&self) -> usize {
    self.num_classes + BOX_CHANNELS
  }

  /// 张量元素个数，溢出时为 None
  pub fn checked_len(&self) -> Option<usize> {
    self.num_boxes.checked_mul(self.num_classes.checked_add(BOX_CHANNELS)?)
  }

  /// 溢出时饱和到 `usize::MAX`，任何实际张量都不会与之相等
  pub fn expected_len(&self) -> usize {
    self.checked_len().unwrap_or(usize::MAX)
  }
}

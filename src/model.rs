// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型输出后处理
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

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 模型加载阶段的错误
#[derive(Error, Debug)]
pub enum ModelError {
  #[error("标签文件加载错误: {0}")]
  LabelLoadError(#[from] std::io::Error),
  #[error("标签表为空")]
  EmptyLabels,
  #[error("不支持的输出形状 {shape:?}, 期望某一维为 {channels}")]
  UnsupportedShape { shape: Vec<usize>, channels: usize },
  #[error("缺少输出形状: 需要 shape 或 boxes + layout")]
  MissingShape,
  #[error("阈值 {name} 超出范围: {value}")]
  InvalidThreshold { name: &'static str, value: f32 },
  #[error("最大输出数量必须大于 0")]
  InvalidMaxDetections,
  #[error("模型输入尺寸必须大于 0")]
  InvalidInputSize,
  #[error("参数 {key} 的值无效: {value}")]
  InvalidQuery { key: String, value: String },
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

impl ModelError {
  pub fn query(key: &str, value: &str) -> Self {
    ModelError::InvalidQuery {
      key: key.to_string(),
      value: value.to_string(),
    }
  }
}

mod decode;
mod labels;
mod meta;
mod nms;
mod postprocess;

pub use self::decode::{Decoder, Thresholds, sigmoid};
pub use self::labels::{COCO_CLASSES, Labels};
pub use self::meta::{BoxUnits, ModelMeta, TensorLayout};
pub use self::nms::Suppressor;
pub use self::postprocess::{
  DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_INPUT_SIZE, DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_DETECTIONS,
  DEFAULT_OBJECTNESS_THRESHOLD, PostprocessBuilder, Postprocessor,
};

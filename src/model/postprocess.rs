// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/postprocess.rs - 后处理流水线
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

use std::{path::PathBuf, str::FromStr};

use tracing::{debug, error, info, warn};
use url::Url;

use super::{
  BoxUnits, Decoder, Labels, Model, ModelError, ModelMeta, Suppressor, TensorLayout, Thresholds,
};
use crate::{
  FromUrl, FromUrlWithScheme,
  detection::DetectResult,
  frame::{FrameError, RawFrame},
  letterbox::LetterboxParams,
};

pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_OBJECTNESS_THRESHOLD: f32 = 0.4;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MAX_DETECTIONS: usize = 20;

/// 张量 + 源图像尺寸 -> 去重后的源图像坐标检测结果
#[derive(Debug, Clone)]
pub struct Postprocessor {
  labels: Labels,
  decoder: Decoder,
  suppressor: Suppressor,
}

impl Postprocessor {
  pub fn new(labels: Labels, decoder: Decoder, suppressor: Suppressor) -> Self {
    Self {
      labels,
      decoder,
      suppressor,
    }
  }

  pub fn labels(&self) -> &Labels {
    &self.labels
  }

  pub fn meta(&self) -> &ModelMeta {
    self.decoder.meta()
  }

  pub fn decoder(&self) -> &Decoder {
    &self.decoder
  }

  pub fn suppressor(&self) -> &Suppressor {
    &self.suppressor
  }

  pub fn process(&self, tensor: &[f32], width: f32, height: f32) -> Result<DetectResult, FrameError> {
    let params = LetterboxParams::new(width, height, self.meta().input_size())?;
    debug!(
      "letterbox: scale={:.4}, pad=({:.1}, {:.1})",
      params.scale(),
      params.pad_x(),
      params.pad_y()
    );

    let candidates = self.decoder.decode(tensor, &params)?;
    let items = self.suppressor.suppress(candidates);
    Ok(DetectResult::new(items, self.labels.clone()))
  }
}

impl Model for Postprocessor {
  type Input = RawFrame;
  type Output = DetectResult;
  type Error = FrameError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.process(input.tensor(), input.width(), input.height())
  }
}

/// 后处理配置
///
/// URL 形式: `yolo:///path/labels.txt?shape=1,85,8400&input=640&obj=0.4&conf=0.4&iou=0.5&max_det=20`，
/// 路径为空时使用内置 COCO 标签。
#[derive(Debug, Clone)]
pub struct PostprocessBuilder {
  labels_path: Option<PathBuf>,
  labels: Option<Labels>,
  shape: Option<Vec<usize>>,
  num_boxes: Option<usize>,
  layout: Option<TensorLayout>,
  input_size: u32,
  units: BoxUnits,
  objectness: f32,
  confidence: f32,
  iou: f32,
  max_detections: usize,
  per_class: bool,
}

impl Default for PostprocessBuilder {
  fn default() -> Self {
    Self {
      labels_path: None,
      labels: None,
      shape: None,
      num_boxes: None,
      layout: None,
      input_size: DEFAULT_INPUT_SIZE,
      units: BoxUnits::Auto,
      objectness: DEFAULT_OBJECTNESS_THRESHOLD,
      confidence: DEFAULT_CONFIDENCE_THRESHOLD,
      iou: DEFAULT_IOU_THRESHOLD,
      max_detections: DEFAULT_MAX_DETECTIONS,
      per_class: false,
    }
  }
}

impl FromUrlWithScheme for PostprocessBuilder {
  const SCHEME: &'static str = "yolo";
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ModelError> {
  value.parse().map_err(|_| ModelError::query(key, value))
}

fn parse_shape(value: &str) -> Result<Vec<usize>, ModelError> {
  value
    .split(',')
    .map(|dim| parse_value::<usize>("shape", dim.trim()))
    .collect()
}

impl FromUrl for PostprocessBuilder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = PostprocessBuilder::default();
    let path = crate::url_file_path(url);
    if !path.as_os_str().is_empty() && path != PathBuf::from("/") {
      builder.labels_path = Some(path);
    }

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "shape" => builder.shape = Some(parse_shape(&value)?),
        "boxes" => builder.num_boxes = Some(parse_value(&key, &value)?),
        "layout" => builder.layout = Some(value.parse()?),
        "input" => builder.input_size = parse_value(&key, &value)?,
        "units" => builder.units = value.parse()?,
        "obj" => builder.objectness = parse_value(&key, &value)?,
        "conf" => builder.confidence = parse_value(&key, &value)?,
        "iou" => builder.iou = parse_value(&key, &value)?,
        "max_det" => builder.max_detections = parse_value(&key, &value)?,
        "per_class" => builder.per_class = value.is_empty() || parse_value(&key, &value)?,
        _ => warn!("忽略未知参数: {}={}", key, value),
      }
    }

    Ok(builder)
  }
}

impl PostprocessBuilder {
  pub fn labels(mut self, labels: Labels) -> Self {
    self.labels = Some(labels);
    self
  }

  pub fn labels_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.labels_path = Some(path.into());
    self
  }

  pub fn shape(mut self, shape: &[usize]) -> Self {
    self.shape = Some(shape.to_vec());
    self
  }

  pub fn boxes(mut self, num_boxes: usize, layout: TensorLayout) -> Self {
    self.num_boxes = Some(num_boxes);
    self.layout = Some(layout);
    self
  }

  pub fn input_size(mut self, input_size: u32) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn units(mut self, units: BoxUnits) -> Self {
    self.units = units;
    self
  }

  pub fn objectness_threshold(mut self, threshold: f32) -> Self {
    self.objectness = threshold;
    self
  }

  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.iou = threshold;
    self
  }

  pub fn max_detections(mut self, max_detections: usize) -> Self {
    self.max_detections = max_detections;
    self
  }

  pub fn per_class(mut self, per_class: bool) -> Self {
    self.per_class = per_class;
    self
  }

  fn check_unit(name: &'static str, value: f32, inclusive: bool) -> Result<(), ModelError> {
    let ok = if inclusive {
      (0.0..=1.0).contains(&value)
    } else {
      value > 0.0 && value < 1.0
    };
    if ok {
      Ok(())
    } else {
      Err(ModelError::InvalidThreshold { name, value })
    }
  }

  pub fn build(self) -> Result<Postprocessor, ModelError> {
    Self::check_unit("objectness", self.objectness, false)?;
    Self::check_unit("confidence", self.confidence, false)?;
    Self::check_unit("iou", self.iou, true)?;
    if self.max_detections == 0 {
      return Err(ModelError::InvalidMaxDetections);
    }
    if self.input_size == 0 {
      return Err(ModelError::InvalidInputSize);
    }

    let labels = match (self.labels, self.labels_path) {
      (Some(labels), _) => labels,
      (None, Some(path)) => Labels::from_file(path)?,
      (None, None) => {
        info!("未指定标签文件，使用内置 COCO 标签");
        Labels::coco()
      }
    };
    if labels.is_empty() {
      return Err(ModelError::EmptyLabels);
    }

    let meta = match (self.shape, self.num_boxes, self.layout) {
      (Some(shape), _, _) => ModelMeta::from_shape(&shape, labels.len(), self.input_size)?,
      (None, Some(num_boxes), Some(layout)) => {
        ModelMeta::new(layout, num_boxes, labels.len(), self.input_size)
      }
      _ => return Err(ModelError::MissingShape),
    }
    .with_units(self.units);
    if meta.checked_len().is_none() {
      error!("框数量 {} 过大，张量长度溢出", meta.num_boxes());
      return Err(ModelError::UnsupportedShape {
        shape: vec![meta.num_boxes(), meta.channels()],
        channels: meta.channels(),
      });
    }

    info!(
      "模型输出: {:?}, 框数量 {}, 类别数 {}, 输入尺寸 {}",
      meta.layout(),
      meta.num_boxes(),
      meta.num_classes(),
      meta.input_size()
    );
    debug!(
      "阈值: objectness={}, confidence={}, iou={}, max_det={}, per_class={}",
      self.objectness, self.confidence, self.iou, self.max_detections, self.per_class
    );

    let decoder = Decoder::new(
      meta,
      Thresholds {
        objectness: self.objectness,
        confidence: self.confidence,
      },
    );
    let suppressor = Suppressor::new(self.iou, self.max_detections).per_class(self.per_class);

    Ok(Postprocessor::new(labels, decoder, suppressor))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
  }

  #[test]
  fn url_with_coco_defaults() {
    let post = PostprocessBuilder::from_url(&url("yolo:///?shape=1,85,100"))
      .unwrap()
      .build()
      .unwrap();
    assert_eq!(post.labels().len(), 80);
    assert_eq!(post.meta().layout(), TensorLayout::ChannelMajor);
    assert_eq!(post.meta().num_boxes(), 100);
    assert_eq!(post.meta().input_size(), DEFAULT_INPUT_SIZE);
    assert_eq!(post.suppressor().max_detections(), DEFAULT_MAX_DETECTIONS);
    assert_eq!(post.decoder().thresholds().objectness, DEFAULT_OBJECTNESS_THRESHOLD);
  }

  #[test]
  fn url_query_overrides() {
    let post = PostprocessBuilder::from_url(&url(
      "yolo:?boxes=10&layout=box-major&input=320&obj=0.25&conf=0.3&iou=0.6&max_det=5&units=normalized&per_class",
    ))
    .unwrap()
    .build()
    .unwrap();
    assert_eq!(post.meta().layout(), TensorLayout::BoxMajor);
    assert_eq!(post.meta().input_size(), 320);
    assert_eq!(post.meta().units(), BoxUnits::Normalized);
    assert_eq!(post.decoder().thresholds().confidence, 0.3);
    assert_eq!(post.suppressor().iou_threshold(), 0.6);
    assert_eq!(post.suppressor().max_detections(), 5);
  }

  #[test]
  fn url_labels_file() {
    let path = std::env::temp_dir().join(format!("shanan post labels {}.txt", std::process::id()));
    std::fs::write(&path, "cat\ndog\n").unwrap();
    let mut u = Url::from_file_path(&path).unwrap();
    u.set_query(Some("shape=1,20,7"));
    let u = url(&u.as_str().replacen("file:", "yolo:", 1));

    let post = PostprocessBuilder::from_url(&u).unwrap().build();
    std::fs::remove_file(&path).ok();
    let post = post.unwrap();
    assert_eq!(post.labels().name(1), Some("dog"));
    assert_eq!(post.meta().layout(), TensorLayout::BoxMajor);
    assert_eq!(post.meta().num_boxes(), 20);
  }

  #[test]
  fn wrong_scheme_is_refused() {
    assert!(matches!(
      PostprocessBuilder::from_url(&url("rknn:///model.rknn")),
      Err(ModelError::ModelPathError(_))
    ));
  }

  #[test]
  fn bad_query_values() {
    assert!(PostprocessBuilder::from_url(&url("yolo:///?iou=high")).is_err());
    assert!(PostprocessBuilder::from_url(&url("yolo:///?shape=1,x,3")).is_err());
    assert!(PostprocessBuilder::from_url(&url("yolo:///?units=inches")).is_err());
  }

  #[test]
  fn build_validates() {
    let base = || PostprocessBuilder::default().shape(&[1, 85, 10]);
    assert!(matches!(
      base().objectness_threshold(1.0).build(),
      Err(ModelError::InvalidThreshold { name: "objectness", .. })
    ));
    assert!(matches!(
      base().confidence_threshold(0.0).build(),
      Err(ModelError::InvalidThreshold { name: "confidence", .. })
    ));
    assert!(base().iou_threshold(1.5).build().is_err());
    assert!(matches!(base().max_detections(0).build(), Err(ModelError::InvalidMaxDetections)));
    assert!(matches!(base().input_size(0).build(), Err(ModelError::InvalidInputSize)));
    assert!(matches!(
      PostprocessBuilder::default().build(),
      Err(ModelError::MissingShape)
    ));
    assert!(matches!(
      PostprocessBuilder::default()
        .labels(Labels::from_iter(Vec::<String>::new()))
        .shape(&[1, 5, 10])
        .build(),
      Err(ModelError::EmptyLabels)
    ));
  }

  #[test]
  fn invalid_geometry_surfaces_from_process() {
    let post = PostprocessBuilder::default()
      .labels(["a"].into_iter().collect())
      .boxes(1, TensorLayout::BoxMajor)
      .build()
      .unwrap();
    let err = post.process(&[0.0; 6], 0.0, 720.0).unwrap_err();
    assert!(matches!(err, FrameError::InvalidGeometry { .. }));
  }

  #[test]
  fn oversized_box_count_is_refused() {
    let huge = PostprocessBuilder::default()
      .labels(["a"].into_iter().collect())
      .boxes(usize::MAX / 2, TensorLayout::BoxMajor)
      .build();
    assert!(matches!(huge, Err(ModelError::UnsupportedShape { channels: 6, .. })));

    let huge = PostprocessBuilder::default()
      .labels(["a"].into_iter().collect())
      .shape(&[1, usize::MAX / 2, 6])
      .build();
    assert!(matches!(huge, Err(ModelError::UnsupportedShape { .. })));
  }
}

// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/decode.rs - 输出张量解码
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

use tracing::{debug, error};

use super::meta::{BOX_CHANNELS, BoxUnits, ModelMeta};
use crate::{detection::Detection, frame::FrameError, letterbox::LetterboxParams};

const CHANNEL_CX: usize = 0;
const CHANNEL_CY: usize = 1;
const CHANNEL_W: usize = 2;
const CHANNEL_H: usize = 3;
const CHANNEL_OBJECTNESS: usize = 4;

pub fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
  /// 目标概率必须严格大于该值
  pub objectness: f32,
  /// objectness * 类别概率低于该值的框被丢弃
  pub confidence: f32,
}

/// 把原始 logits 解码为源图像坐标下的候选框
#[derive(Debug, Clone)]
pub struct Decoder {
  meta: ModelMeta,
  thresholds: Thresholds,
  box_stride: usize,
  channel_stride: usize,
}

impl Decoder {
  pub fn new(meta: ModelMeta, thresholds: Thresholds) -> Self {
    let (box_stride, channel_stride) = meta.layout().strides(meta.num_boxes(), meta.channels());
    Self {
      meta,
      thresholds,
      box_stride,
      channel_stride,
    }
  }

  pub fn meta(&self) -> &ModelMeta {
    &self.meta
  }

  pub fn thresholds(&self) -> Thresholds {
    self.thresholds
  }

  /// 解码一帧，结果无序
  pub fn decode(
    &self,
    tensor: &[f32],
    params: &LetterboxParams,
  ) -> Result<Vec<Detection>, FrameError> {
    let expected = self.meta.expected_len();
    if tensor.len() != expected {
      error!(
        "输出张量长度不匹配: 期望 {} ({} 个框 x {} 通道), 实际 {}",
        expected,
        self.meta.num_boxes(),
        self.meta.channels(),
        tensor.len()
      );
      return Err(FrameError::TensorShapeMismatch {
        expected,
        actual: tensor.len(),
      });
    }

    let cs = self.channel_stride;
    let num_classes = self.meta.num_classes();
    let input_size = self.meta.input_size() as f32;
    let max_x = params.source_width() - 1.0;
    let max_y = params.source_height() - 1.0;

    let mut items = Vec::new();
    for i in 0..self.meta.num_boxes() {
      let base = i * self.box_stride;

      // 先看目标概率，大部分框在这里就被排除
      let obj_prob = sigmoid(tensor[base + CHANNEL_OBJECTNESS * cs]);
      if !(obj_prob > self.thresholds.objectness) {
        continue;
      }

      let mut best_idx = 0usize;
      let mut best_prob = 0.0f32;
      for c in 0..num_classes {
        let prob = sigmoid(tensor[base + (BOX_CHANNELS + c) * cs]);
        if prob > best_prob {
          best_prob = prob;
          best_idx = c;
        }
      }

      let confidence = obj_prob * best_prob;
      if !(confidence >= self.thresholds.confidence) {
        continue;
      }

      let mut cx = tensor[base + CHANNEL_CX * cs];
      let mut cy = tensor[base + CHANNEL_CY * cs];
      let mut w = tensor[base + CHANNEL_W * cs];
      let mut h = tensor[base + CHANNEL_H * cs];
      if ![cx, cy, w, h].iter().all(|v| v.is_finite()) {
        continue;
      }

      let normalized = match self.meta.units() {
        BoxUnits::Auto => cx <= 1.0 && cy <= 1.0 && w <= 1.0 && h <= 1.0,
        BoxUnits::Normalized => true,
        BoxUnits::Pixels => false,
      };
      if normalized {
        cx *= input_size;
        cy *= input_size;
        w *= input_size;
        h *= input_size;
      }

      let (left, top) = params.to_source(cx - w / 2.0, cy - h / 2.0);
      let (right, bottom) = params.to_source(cx + w / 2.0, cy + h / 2.0);

      let l = left.max(0.0);
      let t = top.max(0.0);
      let r = right.min(max_x);
      let b = bottom.min(max_y);

      // 退化框直接丢弃
      if let Some(detection) = Detection::new(l, t, r, b, best_idx, confidence) {
        items.push(detection);
      }
    }

    debug!("解码得到 {} 个候选框", items.len());
    Ok(items)
  }
}

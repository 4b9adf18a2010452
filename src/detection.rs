// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detection.rs - 检测结果与几何工具
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

use crate::model::Labels;

/// 检测结果，坐标为源图像像素坐标
///
/// 构造后不可修改；面积必定为正。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  left: f32,
  top: f32,
  right: f32,
  bottom: f32,
  class_id: usize,
  score: f32,
}

impl Detection {
  /// 面积不为正或不是有限值、含有非有限值、置信度不在 (0, 1] 时返回 `None`
  pub fn new(
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
    class_id: usize,
    score: f32,
  ) -> Option<Self> {
    let finite = [left, top, right, bottom, score]
      .iter()
      .all(|v| v.is_finite());
    if !finite || right <= left || bottom <= top {
      return None;
    }
    if !(score > 0.0 && score <= 1.0) || !((right - left) * (bottom - top)).is_finite() {
      return None;
    }

    Some(Self {
      left,
      top,
      right,
      bottom,
      class_id,
      score,
    })
  }

  pub fn left(&self) -> f32 {
    self.left
  }

  pub fn top(&self) -> f32 {
    self.top
  }

  pub fn right(&self) -> f32 {
    self.right
  }

  pub fn bottom(&self) -> f32 {
    self.bottom
  }

  /// 类别索引，对应标签表中的位置
  pub fn class_id(&self) -> usize {
    self.class_id
  }

  pub fn score(&self) -> f32 {
    self.score
  }

  /// [x_min, y_min, x_max, y_max]
  pub fn bbox(&self) -> [f32; 4] {
    [self.left, self.top, self.right, self.bottom]
  }

  pub fn area(&self) -> f32 {
    area(self)
  }

  pub fn iou(&self, other: &Detection) -> f32 {
    iou(self, other)
  }
}

pub fn area(d: &Detection) -> f32 {
  (d.right - d.left) * (d.bottom - d.top)
}

/// 两个框的交并比，取值范围 [0, 1]，满足交换律
///
/// 中间量用 f64 计算，接近 f32 上限的大框不会溢出。
pub fn iou(a: &Detection, b: &Detection) -> f32 {
  let extent = |lo: f32, hi: f32| (hi as f64 - lo as f64).max(0.0);
  let area64 = |d: &Detection| extent(d.left, d.right) * extent(d.top, d.bottom);

  let inter = extent(a.left.max(b.left), a.right.min(b.right))
    * extent(a.top.max(b.top), a.bottom.min(b.bottom));
  let union = area64(a) + area64(b) - inter;

  if union.is_nan() || union <= 0.0 {
    0.0
  } else {
    (inter / union).clamp(0.0, 1.0) as f32
  }
}

/// 一帧经过抑制后的检测结果，按置信度降序排列，附带标签表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
  labels: Labels,
}

impl DetectResult {
  pub fn new(items: Vec<Detection>, labels: Labels) -> Self {
    Self {
      items: items.into_boxed_slice(),
      labels,
    }
  }

  pub fn empty() -> Self {
    Self::default()
  }

  pub fn labels(&self) -> &Labels {
    &self.labels
  }

  /// 检测的类别名称，超出标签表时为 "unknown"
  pub fn label(&self, detection: &Detection) -> &str {
    self.labels.name_or_unknown(detection.class_id())
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  /// 置信度最高的检测
  pub fn top(&self) -> Option<&Detection> {
    self.items.first()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self::new(items, Labels::default())
  }
}

impl<'a> IntoIterator for &'a DetectResult {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

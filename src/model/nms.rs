// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use tracing::debug;

use crate::detection::Detection;

/// 贪心非极大值抑制
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Suppressor {
  iou_threshold: f32,
  max_detections: usize,
  per_class: bool,
}

impl Suppressor {
  pub fn new(iou_threshold: f32, max_detections: usize) -> Self {
    Self {
      iou_threshold,
      max_detections,
      per_class: false,
    }
  }

  /// 只让同一类别的框互相抑制
  pub fn per_class(mut self, per_class: bool) -> Self {
    self.per_class = per_class;
    self
  }

  pub fn iou_threshold(&self) -> f32 {
    self.iou_threshold
  }

  pub fn max_detections(&self) -> usize {
    self.max_detections
  }

  /// 返回按置信度降序排列、至多 `max_detections` 个互不重叠的框
  ///
  /// 排序是稳定的，置信度相同的框保持输入顺序。
  pub fn suppress(&self, mut candidates: Vec<Detection>) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.score().total_cmp(&a.score()));

    let mut kept: Vec<Detection> = Vec::with_capacity(self.max_detections.min(candidates.len()));
    for candidate in candidates.iter() {
      if kept.len() >= self.max_detections {
        break;
      }

      let suppressed = kept.iter().any(|accepted| {
        (!self.per_class || accepted.class_id() == candidate.class_id())
          && accepted.iou(candidate) > self.iou_threshold
      });
      if !suppressed {
        kept.push(*candidate);
      }
    }

    debug!("NMS: {} -> {}", candidates.len(), kept.len());
    kept
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::iou;

  fn det(l: f32, t: f32, r: f32, b: f32, class_id: usize, score: f32) -> Detection {
    Detection::new(l, t, r, b, class_id, score).unwrap()
  }

  #[test]
  fn empty_in_empty_out() {
    assert!(Suppressor::new(0.5, 20).suppress(Vec::new()).is_empty());
  }

  #[test]
  fn overlap_above_threshold_keeps_higher_score() {
    // 交 60 / 并 100 = 0.6
    let low = det(0.0, 0.0, 80.0, 1.0, 0, 0.7);
    let high = det(20.0, 0.0, 100.0, 1.0, 0, 0.9);
    assert!((iou(&low, &high) - 0.6).abs() < 1e-6);

    let kept = Suppressor::new(0.5, 20).suppress(vec![low, high]);
    assert_eq!(kept, vec![high]);
  }

  #[test]
  fn overlap_equal_to_threshold_is_kept() {
    // 交 50 / 并 150 = 1/3
    let a = det(0.0, 0.0, 10.0, 10.0, 0, 0.9);
    let b = det(5.0, 0.0, 15.0, 10.0, 0, 0.8);
    let threshold = iou(&a, &b);
    assert_eq!(Suppressor::new(threshold, 20).suppress(vec![a, b]).len(), 2);
  }

  #[test]
  fn output_sorted_descending() {
    let items = vec![
      det(0.0, 0.0, 10.0, 10.0, 0, 0.3),
      det(20.0, 0.0, 30.0, 10.0, 0, 0.9),
      det(40.0, 0.0, 50.0, 10.0, 0, 0.6),
    ];
    let kept = Suppressor::new(0.5, 20).suppress(items);
    let scores: Vec<f32> = kept.iter().map(Detection::score).collect();
    assert_eq!(scores, vec![0.9, 0.6, 0.3]);
  }

  #[test]
  fn cap_limits_output() {
    let items: Vec<Detection> = (0..50)
      .map(|i| {
        let x = i as f32 * 20.0;
        det(x, 0.0, x + 10.0, 10.0, 0, 0.5 + i as f32 / 200.0)
      })
      .collect();
    let kept = Suppressor::new(0.5, 20).suppress(items);
    assert_eq!(kept.len(), 20);
    assert_eq!(kept[0].left(), 49.0 * 20.0);
    assert_eq!(Suppressor::new(0.5, 0).suppress(kept).len(), 0);
  }

  #[test]
  fn ties_keep_input_order() {
    let first = det(0.0, 0.0, 10.0, 10.0, 0, 0.8);
    let second = det(1.0, 1.0, 11.0, 11.0, 1, 0.8);
    let third = det(100.0, 100.0, 110.0, 110.0, 2, 0.8);

    let kept = Suppressor::new(0.5, 20).suppress(vec![first, second, third]);
    assert_eq!(kept, vec![first, third]);

    let kept = Suppressor::new(0.5, 20).suppress(vec![second, first, third]);
    assert_eq!(kept, vec![second, third]);

    // 截断处的平局同样按输入顺序
    let kept = Suppressor::new(0.5, 1).suppress(vec![third, first]);
    assert_eq!(kept, vec![third]);
  }

  #[test]
  fn per_class_lets_other_classes_overlap() {
    let person = det(0.0, 0.0, 10.0, 10.0, 0, 0.9);
    let bike = det(0.0, 0.0, 10.0, 10.0, 1, 0.8);
    let person_dup = det(1.0, 0.0, 10.0, 10.0, 0, 0.7);

    let agnostic = Suppressor::new(0.5, 20).suppress(vec![person, bike, person_dup]);
    assert_eq!(agnostic, vec![person]);

    let per_class = Suppressor::new(0.5, 20)
      .per_class(true)
      .suppress(vec![person, bike, person_dup]);
    assert_eq!(per_class, vec![person, bike]);
  }

  #[test]
  fn survivors_never_overlap_beyond_threshold() {
    let mut items = Vec::new();
    for i in 0..12 {
      for j in 0..6 {
        let x = i as f32 * 7.0;
        let y = j as f32 * 9.0;
        let score = ((i * 31 + j * 17) % 97) as f32 / 100.0 + 0.01;
        items.push(det(x, y, x + 20.0, y + 25.0, (i + j) % 3, score));
      }
    }
    for threshold in [0.1, 0.3, 0.5, 0.7] {
      let kept = Suppressor::new(threshold, 30).suppress(items.clone());
      assert!(kept.len() <= 30);
      for (i, a) in kept.iter().enumerate() {
        for b in &kept[i + 1..] {
          assert!(iou(a, b) <= threshold);
          assert!(a.score() >= b.score());
        }
      }
    }
  }
}

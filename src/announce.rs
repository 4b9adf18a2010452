// 该文件是 Shanan （山南西风） 项目的一部分。
// src/announce.rs - 语音播报状态
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

use crate::detection::DetectResult;

pub const NOTHING_DETECTED: &str = "Detected: None";

/// 状态栏文本：最高置信度的类别与百分比
pub fn status_line(result: &DetectResult) -> String {
  match result.top() {
    Some(top) => format!(
      "{} {}%",
      result.label(top),
      (top.score() * 100.0) as u32
    ),
    None => NOTHING_DETECTED.to_string(),
  }
}

/// 播报状态，由语音端持有，每帧用后处理结果驱动
///
/// 同一个目标持续出现时只播报一次；目标消失后再次出现会重新播报。
#[derive(Debug, Clone, Default)]
pub struct Announcer {
  sound_enabled: bool,
  last_spoken: Option<String>,
  speaking: bool,
}

impl Announcer {
  pub fn new(sound_enabled: bool) -> Self {
    Self {
      sound_enabled,
      ..Self::default()
    }
  }

  pub fn sound_enabled(&self) -> bool {
    self.sound_enabled
  }

  pub fn set_sound_enabled(&mut self, enabled: bool) {
    self.sound_enabled = enabled;
  }

  pub fn last_spoken(&self) -> Option<&str> {
    self.last_spoken.as_deref()
  }

  /// 返回需要播报的文本
  pub fn observe(&mut self, result: &DetectResult) -> Option<String> {
    let Some(top) = result.top() else {
      self.speaking = false;
      return None;
    };
    if !self.sound_enabled {
      return None;
    }

    let label = result.label(top);
    if self.speaking && self.last_spoken.as_deref() == Some(label) {
      return None;
    }

    self.last_spoken = Some(label.to_string());
    self.speaking = true;
    Some(label.to_string())
  }
}

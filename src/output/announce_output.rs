// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/announce_output.rs - 语音播报输出
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

use std::sync::Mutex;

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  announce::Announcer,
  detection::DetectResult,
  frame::RawFrame,
  output::Render,
};

#[derive(Error, Debug)]
pub enum AnnounceOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("播报状态已损坏")]
  Poisoned,
}

/// 把需要播报的文本写入日志，`announce:?mute` 时静音
pub struct AnnounceOutput {
  announcer: Mutex<Announcer>,
}

impl FromUrlWithScheme for AnnounceOutput {
  const SCHEME: &'static str = "announce";
}

impl FromUrl for AnnounceOutput {
  type Error = AnnounceOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(AnnounceOutputError::SchemeMismatch);
    }
    let mute = uri.query_pairs().any(|(k, _)| k == "mute");
    Ok(Self::new(Announcer::new(!mute)))
  }
}

impl AnnounceOutput {
  pub fn new(announcer: Announcer) -> Self {
    Self {
      announcer: Mutex::new(announcer),
    }
  }

  /// 本帧需要播报的文本
  pub fn observe(&self, result: &DetectResult) -> Result<Option<String>, AnnounceOutputError> {
    let mut announcer = self
      .announcer
      .lock()
      .map_err(|_| AnnounceOutputError::Poisoned)?;
    Ok(announcer.observe(result))
  }
}

impl Render<RawFrame, DetectResult> for AnnounceOutput {
  type Error = AnnounceOutputError;

  fn render_result(&self, _frame: &RawFrame, result: &DetectResult) -> Result<(), Self::Error> {
    if let Some(utterance) = self.observe(result)? {
      info!("播报: {}", utterance);
    }
    Ok(())
  }
}

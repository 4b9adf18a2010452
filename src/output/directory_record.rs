// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{DateTime, Datelike, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  detection::DetectResult,
  frame::RawFrame,
  output::Render,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 每个检测一行：`name, score, left, top, right, bottom`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn format(&self, result: &DetectResult) -> String {
    let mut records = Vec::with_capacity(result.len());
    for item in result.iter() {
      let name = if self.label_with_name {
        result.label(item).to_string()
      } else {
        format!("{}", item.class_id())
      };
      let [l, t, r, b] = item.bbox();
      records.push(format!(
        "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
        name,
        item.score(),
        l,
        t,
        r,
        b
      ));
    }
    records.join("\n")
  }

  pub fn record(&self, result: &DetectResult, path: &Path) -> Result<(), std::io::Error> {
    std::fs::write(path, self.format(result))
  }
}

/// 按日期分目录保存每帧的检测记录
///
/// `folder:///var/lib/shanan?record=id&always`，默认只记录有检测的帧。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: Record,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let label_with_name = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| v != "id")
      .unwrap_or(true);
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput::new(
      crate::url_file_path(uri),
      Record { label_with_name },
      always,
    ))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: PathBuf, record: Record, always: bool) -> Self {
    Self {
      directory,
      record,
      frame_counter: AtomicU16::new(0),
      always,
    }
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  /// `<dir>/YYYY/MM/DD/HH-MM-SS-XXXX.txt`
  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.txt",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<RawFrame, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, _frame: &RawFrame, result: &DetectResult) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      return Ok(());
    }
    let path = self.frame_path(Utc::now())?;
    self.record.record(result, &path)?;
    debug!("检测记录已保存到 {}", path.display());
    Ok(())
  }
}

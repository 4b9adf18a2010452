// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/console_output.rs - 日志输出
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
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  announce::status_line,
  detection::DetectResult,
  frame::{FrameError, RawFrame},
  letterbox::ViewMapping,
  output::Render,
};

#[derive(Error, Debug)]
pub enum ConsoleOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("视图尺寸无效: {0}")]
  InvalidView(String),
  #[error("视图映射错误: {0}")]
  ViewMappingError(#[from] FrameError),
}

/// 把检测结果写入日志
///
/// `console:?view=1080x1920` 时同时打印映射到该视图后的坐标。
pub struct ConsoleOutput {
  view: Option<(f32, f32)>,
}

impl FromUrlWithScheme for ConsoleOutput {
  const SCHEME: &'static str = "console";
}

fn parse_view(value: &str) -> Option<(f32, f32)> {
  let (w, h) = value.split_once('x')?;
  Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

impl FromUrl for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(ConsoleOutputError::SchemeMismatch);
    }

    let mut view = None;
    for (k, v) in uri.query_pairs() {
      if k == "view" {
        view = Some(parse_view(&v).ok_or_else(|| ConsoleOutputError::InvalidView(v.to_string()))?);
      }
    }

    Ok(ConsoleOutput { view })
  }
}

impl ConsoleOutput {
  pub fn new() -> Self {
    Self { view: None }
  }

  pub fn with_view(mut self, width: f32, height: f32) -> Self {
    self.view = Some((width, height));
    self
  }

  /// 每个检测一行
  pub fn format_lines(&self, frame: &RawFrame, result: &DetectResult) -> Result<Vec<String>, ConsoleOutputError> {
    let mapping = match self.view {
      Some((w, h)) => Some(ViewMapping::fit(frame.width(), frame.height(), w, h)?),
      None => None,
    };

    let lines = result
      .iter()
      .map(|det| {
        let mut line = format!(
          "{}: {:.2}% at ({:.0}, {:.0}, {:.0}, {:.0})",
          result.label(det),
          det.score() * 100.0,
          det.left(),
          det.top(),
          det.right(),
          det.bottom()
        );
        if let Some(mapping) = &mapping {
          let [l, t, r, b] = mapping.map(det);
          line.push_str(&format!(" -> view ({:.0}, {:.0}, {:.0}, {:.0})", l, t, r, b));
        }
        line
      })
      .collect();
    Ok(lines)
  }
}

impl Default for ConsoleOutput {
  fn default() -> Self {
    Self::new()
  }
}

impl Render<RawFrame, DetectResult> for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn render_result(&self, frame: &RawFrame, result: &DetectResult) -> Result<(), Self::Error> {
    info!("{}", status_line(result));
    for line in self.format_lines(frame, result)? {
      info!("  - {}", line);
    }
    Ok(())
  }
}

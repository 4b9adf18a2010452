// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/jsonl_output.rs - JSON Lines 输出
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

use std::{
  fs::OpenOptions,
  io::{BufWriter, Write},
  sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
  },
};

use chrono::Utc;
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detection::DetectResult,
  frame::RawFrame,
  output::Render,
};

#[derive(Error, Debug)]
pub enum JsonlOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
  #[error("输出已损坏")]
  Poisoned,
}

/// 一帧结果的 JSON 表示
pub fn result_to_json(frame_number: u64, frame: &RawFrame, result: &DetectResult) -> Value {
  let detections: Vec<Value> = result
    .iter()
    .map(|det| {
      json!({
        "label": result.label(det),
        "class_id": det.class_id(),
        "score": det.score(),
        "bbox": det.bbox(),
      })
    })
    .collect();

  json!({
    "frame": frame_number,
    "timestamp": Utc::now().to_rfc3339(),
    "width": frame.width(),
    "height": frame.height(),
    "detections": detections,
  })
}

/// 每帧追加一行 JSON 到文件
pub struct JsonlOutput {
  writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
  frame_counter: AtomicU64,
}

impl FromUrlWithScheme for JsonlOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonlOutput {
  type Error = JsonlOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonlOutputError::SchemeMismatch);
    }

    let path = crate::url_file_path(uri);
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Self::from_writer(file))
  }
}

impl JsonlOutput {
  pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
    let writer: Box<dyn Write + Send> = Box::new(writer);
    Self {
      writer: Mutex::new(BufWriter::new(writer)),
      frame_counter: AtomicU64::new(0),
    }
  }
}

impl Render<RawFrame, DetectResult> for JsonlOutput {
  type Error = JsonlOutputError;

  fn render_result(&self, frame: &RawFrame, result: &DetectResult) -> Result<(), Self::Error> {
    let frame_number = self.frame_counter.fetch_add(1, Ordering::Relaxed);
    let line = serde_json::to_string(&result_to_json(frame_number, frame, result))?;

    let mut writer = self.writer.lock().map_err(|_| JsonlOutputError::Poisoned)?;
    writeln!(writer, "{}", line)?;
    writer.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{detection::Detection, model::Labels};
  use std::sync::Arc;

  #[derive(Clone, Default)]
  struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

  impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
      Ok(())
    }
  }

  #[test]
  fn one_line_per_frame() {
    let buffer = SharedBuffer::default();
    let output = JsonlOutput::from_writer(buffer.clone());
    let frame = RawFrame::new(Vec::new(), 1280.0, 720.0);

    let labels: Labels = ["person"].into_iter().collect();
    let det = Detection::new(540.0, 260.0, 740.0, 460.0, 0, 0.5).unwrap();
    output
      .render_result(&frame, &DetectResult::new(vec![det], labels))
      .unwrap();
    output.render_result(&frame, &DetectResult::empty()).unwrap();

    let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    let lines: Vec<Value> = text
      .lines()
      .map(|line| serde_json::from_str(line).unwrap())
      .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["frame"], 0);
    assert_eq!(lines[0]["width"], 1280.0);
    assert_eq!(lines[0]["detections"][0]["label"], "person");
    assert_eq!(lines[0]["detections"][0]["bbox"][2], 740.0);
    assert_eq!(lines[1]["frame"], 1);
    assert_eq!(lines[1]["detections"].as_array().map(Vec::len), Some(0));
  }

  #[test]
  fn existing_file_is_appended() {
    let path = std::env::temp_dir().join(format!("shanan-post-append-{}.jsonl", std::process::id()));
    std::fs::write(&path, "{\"frame\":41}\n").unwrap();

    let url = Url::parse(&format!("jsonl://{}", path.display())).unwrap();
    let output = JsonlOutput::from_url(&url).unwrap();
    output
      .render_result(&RawFrame::new(Vec::new(), 640.0, 480.0), &DetectResult::empty())
      .unwrap();
    drop(output);

    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).ok();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "{\"frame\":41}");
    assert!(lines[1].contains("\"detections\":[]"));
  }
}

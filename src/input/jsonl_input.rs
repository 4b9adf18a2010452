// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/jsonl_input.rs - JSON Lines 帧输入
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
  fs::File,
  io::{BufRead, BufReader, Lines},
};

use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RawFrame};

#[derive(Error, Debug)]
pub enum JsonlInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
}

/// 每行一帧：`{"width": 1280, "height": 720, "tensor": [...]}`
///
/// 格式错误的行记录日志后跳过。
pub struct JsonlInput {
  lines: Lines<Box<dyn BufRead + Send>>,
  line_number: usize,
}

impl FromUrlWithScheme for JsonlInput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonlInput {
  type Error = JsonlInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(JsonlInputError::SchemaMismatch);
    }

    let file = File::open(crate::url_file_path(url))?;
    Ok(Self::from_reader(BufReader::new(file)))
  }
}

impl JsonlInput {
  pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
    let reader: Box<dyn BufRead + Send> = Box::new(reader);
    Self {
      lines: reader.lines(),
      line_number: 0,
    }
  }
}

/// 解析一行 JSON，字段缺失或类型不对时返回 None
fn parse_frame(value: &Value) -> Option<RawFrame> {
  let width = value.get("width")?.as_f64()? as f32;
  let height = value.get("height")?.as_f64()? as f32;
  let tensor = value
    .get("tensor")?
    .as_array()?
    .iter()
    .map(|v| v.as_f64().map(|x| x as f32))
    .collect::<Option<Vec<f32>>>()?;
  Some(RawFrame::new(tensor, width, height))
}

impl Iterator for JsonlInput {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let line = match self.lines.next()? {
        Ok(line) => line,
        Err(e) => {
          error!("读取输入失败: {}", e);
          return None;
        }
      };
      self.line_number += 1;

      if line.trim().is_empty() {
        continue;
      }

      let frame = serde_json::from_str::<Value>(&line)
        .ok()
        .and_then(|value| parse_frame(&value));
      match frame {
        Some(frame) => return Some(frame),
        None => warn!("第 {} 行格式错误，跳过", self.line_number),
      }
    }
  }
}

// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/raw_tensor_file.rs - 原始张量文件输入
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
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RawFrame};

const F32_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Error, Debug)]
pub enum RawTensorFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Missing query parameter: {0}")]
  MissingParameter(&'static str),
  #[error("Invalid query parameter {0}: {1}")]
  InvalidParameter(&'static str, String),
  #[error("File size {0} is not a multiple of 4 bytes")]
  TruncatedTensor(usize),
}

/// 读取一个小端 f32 张量文件，产生一帧
///
/// `raw:///path/frame.bin?width=1280&height=720`
pub struct RawTensorFileInput {
  frame: Option<RawFrame>,
}

impl FromUrlWithScheme for RawTensorFileInput {
  const SCHEME: &'static str = "raw";
}

fn size_parameter(url: &Url, key: &'static str) -> Result<f32, RawTensorFileInputError> {
  let value = url
    .query_pairs()
    .find(|(k, _)| k == key)
    .map(|(_, v)| v.into_owned())
    .ok_or(RawTensorFileInputError::MissingParameter(key))?;
  value
    .parse()
    .map_err(|_| RawTensorFileInputError::InvalidParameter(key, value))
}

/// 小端字节序转换为 f32
pub fn tensor_from_le_bytes(bytes: &[u8]) -> Result<Vec<f32>, RawTensorFileInputError> {
  if bytes.len() % F32_BYTES != 0 {
    return Err(RawTensorFileInputError::TruncatedTensor(bytes.len()));
  }
  Ok(
    bytes
      .chunks_exact(F32_BYTES)
      .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
      .collect(),
  )
}

impl FromUrl for RawTensorFileInput {
  type Error = RawTensorFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(RawTensorFileInputError::SchemaMismatch);
    }

    let width = size_parameter(url, "width")?;
    let height = size_parameter(url, "height")?;

    let path = crate::url_file_path(url);
    let bytes = std::fs::read(&path)?;
    let tensor = tensor_from_le_bytes(&bytes)?;
    debug!("读取张量文件 {}: {} 个值", path.display(), tensor.len());

    Ok(RawTensorFileInput {
      frame: Some(RawFrame::new(tensor, width, height)),
    })
  }
}

impl Iterator for RawTensorFileInput {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 推理输出帧来源
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

use crate::{FromUrl, FromUrlWithScheme, frame::RawFrame};

mod jsonl_input;
mod raw_tensor_file;

pub use self::jsonl_input::{JsonlInput, JsonlInputError};
pub use self::raw_tensor_file::{RawTensorFileInput, RawTensorFileInputError, tensor_from_le_bytes};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Raw tensor file input error: {0}")]
  RawTensorFileInputError(#[from] RawTensorFileInputError),
  #[error("JSON lines input error: {0}")]
  JsonlInputError(#[from] JsonlInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  RawTensorFile(RawTensorFileInput),
  Jsonl(JsonlInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      RawTensorFileInput::SCHEME => Ok(InputWrapper::RawTensorFile(RawTensorFileInput::from_url(
        url,
      )?)),
      JsonlInput::SCHEME => Ok(InputWrapper::Jsonl(JsonlInput::from_url(url)?)),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::RawTensorFile(input) => input.next(),
      InputWrapper::Jsonl(input) => input.next(),
    }
  }
}

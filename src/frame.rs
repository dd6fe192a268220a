// 该文件是 Realesrgan-ncnn 项目的一部分。
// src/frame.rs - 交给原生引擎的图像缓冲区
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

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("buffer length mismatch: expected {expected} bytes, got {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 按行优先、通道交错（HWC）排列的 8 位图像缓冲区。
///
/// 缓冲区长度始终等于 `width * height * channels`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
  data: Box<[u8]>,
  width: u32,
  height: u32,
  channels: u32,
}

pub(crate) fn expected_len(width: u32, height: u32, channels: u32) -> usize {
  width as usize * height as usize * channels as usize
}

impl RawImage {
  pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u32) -> Result<Self, FrameError> {
    let expected = expected_len(width, height, channels);
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
      width,
      height,
      channels,
    })
  }

  /// 全零缓冲区，用作原生引擎的输出
  pub fn zeroed(width: u32, height: u32, channels: u32) -> Self {
    let data = vec![0u8; expected_len(width, height, channels)].into_boxed_slice();
    Self {
      data,
      width,
      height,
      channels,
    }
  }

  /// 原地替换像素内容，不重新分配缓冲区
  pub fn set_data(&mut self, data: &[u8]) -> Result<(), FrameError> {
    if data.len() != self.data.len() {
      return Err(FrameError::LengthMismatch {
        expected: self.data.len(),
        actual: data.len(),
      });
    }
    self.data.copy_from_slice(data);
    Ok(())
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> u32 {
    self.channels
  }

  pub fn data(&self) -> &[u8] {
    &self.data
  }

  pub fn has_shape(&self, width: u32, height: u32, channels: u32) -> bool {
    self.width == width && self.height == height && self.channels == channels
  }

  pub fn into_data(self) -> Vec<u8> {
    self.data.into_vec()
  }
}

impl AsMut<[u8]> for RawImage {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl AsRef<[u8]> for RawImage {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

/// 交换每个像素的第 0 与第 2 个通道（BGR <-> RGB，BGRA <-> RGBA）
pub fn swap_red_blue(data: &mut [u8], channels: usize) {
  if channels < 3 {
    return;
  }
  for pixel in data.chunks_exact_mut(channels) {
    pixel.swap(0, 2);
  }
}

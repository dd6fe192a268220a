// 该文件是 Realesrgan-ncnn 项目的一部分。
// src/engine.rs - 原生超分引擎接口
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

use std::fmt;
use std::path::Path;

use crate::frame::RawImage;

/// 推理设备
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
  Cpu,
  Gpu(u32),
}

impl Device {
  /// `-1` 表示 CPU，其余非负值为 GPU 编号；更小的值返回 `None`
  pub fn from_id(id: i32) -> Option<Self> {
    match id {
      -1 => Some(Device::Cpu),
      id if id >= 0 => Some(Device::Gpu(id as u32)),
      _ => None,
    }
  }

  pub fn id(self) -> i32 {
    match self {
      Device::Cpu => -1,
      Device::Gpu(id) => id as i32,
    }
  }
}

impl fmt::Display for Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Device::Cpu => f.write_str("cpu"),
      Device::Gpu(id) => write!(f, "gpu:{}", id),
    }
  }
}

/// 分块大小，`Auto` 按设备显存预算自动选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSize {
  Auto,
  Fixed(u32),
}

pub const MIN_TILE_SIZE: u32 = 32;

impl TileSize {
  /// `0` 为自动，其余值必须不小于 32
  pub fn from_value(value: u32) -> Option<Self> {
    match value {
      0 => Some(TileSize::Auto),
      v if v >= MIN_TILE_SIZE => Some(TileSize::Fixed(v)),
      _ => None,
    }
  }

  pub fn resolve(self, device: Device, heap_budget: Option<u32>) -> u32 {
    match self {
      TileSize::Fixed(size) => size,
      TileSize::Auto => auto_tile_size(device, heap_budget),
    }
  }
}

/// 依据显存预算（MB）选择分块大小；CPU 或无法查询时分别使用固定值
pub fn auto_tile_size(device: Device, heap_budget: Option<u32>) -> u32 {
  if device == Device::Cpu {
    return 400;
  }
  match heap_budget.unwrap_or(0) {
    b if b >= 1900 => 200,
    b if b >= 550 => 100,
    b if b >= 190 => 64,
    _ => 32,
  }
}

/// 预编译超分引擎的句柄。
///
/// 实现方拥有原生资源，`Drop` 时释放。所有尺寸均以像素计，
/// 缓冲区为 8 位 HWC 排列。
pub trait NativeEngine: Sized {
  type Error: std::error::Error + Send + Sync + 'static;

  fn create(device: Device, tta: bool) -> Result<Self, Self::Error>;

  /// 设备显存预算（MB），CPU 或不可查询时为 `None`
  fn heap_budget(&self) -> Option<u32>;

  fn set_parameters(&mut self, tile_size: u32, scale: u32);

  fn load(&mut self, param_path: &Path, model_path: &Path) -> Result<(), Self::Error>;

  fn process(&self, input: &RawImage, output: &mut RawImage) -> Result<(), Self::Error>;
}

pub mod nearest;
pub use self::nearest::{NearestEngine, NearestEngineError};

#[cfg(feature = "ncnn")]
pub mod ncnn;
#[cfg(feature = "ncnn")]
pub use self::ncnn::{NcnnEngine, NcnnError};

// 该文件是 Realesrgan-ncnn 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod engine;
pub mod frame;
pub mod model;
#[cfg(feature = "image")]
pub mod task;
pub mod upscaler;

pub use crate::engine::{Device, NativeEngine, NearestEngine, TileSize};
pub use crate::frame::RawImage;
pub use crate::model::{BuiltinModel, ModelFiles, ModelSource};
pub use crate::upscaler::{ModelState, Realesrgan, UpscalerConfig, UpscalerError};

#[cfg(feature = "ncnn")]
pub use crate::engine::ncnn::{NcnnEngine, destroy_gpu_instance, gpu_count};

/// 默认引擎：启用 `ncnn` 特性时为原生引擎，否则为 CPU 参考引擎
#[cfg(feature = "ncnn")]
pub type DefaultEngine = NcnnEngine;
#[cfg(not(feature = "ncnn"))]
pub type DefaultEngine = NearestEngine;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

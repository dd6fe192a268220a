// 该文件是 Realesrgan-ncnn 项目的一部分。
// src/engine/nearest.rs - CPU 参考引擎（最近邻复制）
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::engine::{Device, NativeEngine};
use crate::frame::RawImage;

#[derive(Error, Debug)]
pub enum NearestEngineError {
  #[error("模型文件无法读取: {path}: {source}")]
  ModelFile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("模型尚未加载")]
  NotLoaded,
  #[error(
    "输出尺寸不匹配: 输入 {in_w}x{in_h}x{in_c}, 放大 {scale} 倍, 输出 {out_w}x{out_h}x{out_c}"
  )]
  Geometry {
    in_w: u32,
    in_h: u32,
    in_c: u32,
    out_w: u32,
    out_h: u32,
    out_c: u32,
    scale: u32,
  },
}

/// 不依赖 GPU 的参考引擎。
///
/// 按照与原生引擎相同的约定工作：加载时检查模型文件存在，
/// 处理时检查输入输出尺寸，输出为逐像素复制的放大结果。
#[derive(Debug)]
pub struct NearestEngine {
  device: Device,
  tta: bool,
  tile_size: u32,
  scale: u32,
  model: Option<(PathBuf, PathBuf)>,
}

impl NearestEngine {
  pub fn device(&self) -> Device {
    self.device
  }

  pub fn tta(&self) -> bool {
    self.tta
  }

  pub fn tile_size(&self) -> u32 {
    self.tile_size
  }

  pub fn scale(&self) -> u32 {
    self.scale
  }

  pub fn loaded_files(&self) -> Option<(&Path, &Path)> {
    self
      .model
      .as_ref()
      .map(|(param, bin)| (param.as_path(), bin.as_path()))
  }
}

fn check_file(path: &Path) -> Result<(), NearestEngineError> {
  std::fs::metadata(path)
    .map(|_| ())
    .map_err(|source| NearestEngineError::ModelFile {
      path: path.to_path_buf(),
      source,
    })
}

impl NativeEngine for NearestEngine {
  type Error = NearestEngineError;

  fn create(device: Device, tta: bool) -> Result<Self, Self::Error> {
    info!("创建参考引擎: 设备 {}, TTA {}", device, tta);
    Ok(Self {
      device,
      tta,
      tile_size: 0,
      scale: 1,
      model: None,
    })
  }

  fn heap_budget(&self) -> Option<u32> {
    None
  }

  fn set_parameters(&mut self, tile_size: u32, scale: u32) {
    self.tile_size = tile_size;
    self.scale = scale;
  }

  fn load(&mut self, param_path: &Path, model_path: &Path) -> Result<(), Self::Error> {
    self.model = None;
    check_file(param_path)?;
    check_file(model_path)?;
    self.model = Some((param_path.to_path_buf(), model_path.to_path_buf()));
    Ok(())
  }

  fn process(&self, input: &RawImage, output: &mut RawImage) -> Result<(), Self::Error> {
    if self.model.is_none() {
      return Err(NearestEngineError::NotLoaded);
    }

    let scale = self.scale;
    if input.width().checked_mul(scale) != Some(output.width())
      || input.height().checked_mul(scale) != Some(output.height())
      || output.channels() != input.channels()
    {
      return Err(NearestEngineError::Geometry {
        in_w: input.width(),
        in_h: input.height(),
        in_c: input.channels(),
        out_w: output.width(),
        out_h: output.height(),
        out_c: output.channels(),
        scale,
      });
    }

    let channels = input.channels() as usize;
    let in_row = input.width() as usize * channels;
    let out_row = output.width() as usize * channels;
    let scale = scale as usize;
    let src = input.data();
    let dst = output.as_mut();

    for (y, out_line) in dst.chunks_exact_mut(out_row).enumerate() {
      let in_line = &src[(y / scale) * in_row..(y / scale + 1) * in_row];
      for (x, out_pixel) in out_line.chunks_exact_mut(channels).enumerate() {
        let offset = (x / scale) * channels;
        out_pixel.copy_from_slice(&in_line[offset..offset + channels]);
      }
    }

    debug!(
      "参考引擎处理完成: {}x{} -> {}x{}",
      input.width(),
      input.height(),
      output.width(),
      output.height()
    );
    Ok(())
  }
}

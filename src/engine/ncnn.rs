// 该文件是 Realesrgan-ncnn 项目的一部分。
// src/engine/ncnn.rs - realesrgan-ncnn-vulkan 原生引擎绑定
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

use std::ffi::{CString, c_int, c_uchar, c_uint, c_void};
use std::path::Path;
use std::ptr::NonNull;

use thiserror::Error;
use tracing::{debug, info};

use crate::engine::{Device, NativeEngine};
use crate::frame::RawImage;

/// 与原生封装一致的预填充像素数
const PREPADDING: c_int = 10;

mod sys {
  use super::*;

  unsafe extern "C" {
    pub fn realesrgan_create(gpuid: c_int, tta_mode: c_int) -> *mut c_void;
    pub fn realesrgan_destroy(handle: *mut c_void);
    pub fn realesrgan_set_parameters(
      handle: *mut c_void,
      tilesize: c_int,
      scale: c_int,
      prepadding: c_int,
    );
    pub fn realesrgan_load(
      handle: *mut c_void,
      parampath: *const std::ffi::c_char,
      modelpath: *const std::ffi::c_char,
    ) -> c_int;
    pub fn realesrgan_process(
      handle: *const c_void,
      in_data: *const c_uchar,
      in_w: c_int,
      in_h: c_int,
      out_data: *mut c_uchar,
      out_w: c_int,
      out_h: c_int,
      channels: c_int,
    ) -> c_int;
    pub fn realesrgan_heap_budget(gpuid: c_int) -> c_uint;
    pub fn realesrgan_gpu_count() -> c_int;
    pub fn realesrgan_destroy_gpu_instance();
  }
}

#[derive(Error, Debug)]
pub enum NcnnError {
  #[error("无法创建 RealESRGAN 实例")]
  CreateFailed,
  #[error("路径包含 NUL 字符: {0}")]
  InvalidPath(String),
  #[error("模型加载失败 (返回码 {code}): {param}, {model}")]
  LoadFailed {
    code: i32,
    param: String,
    model: String,
  },
  #[error("推理失败 (返回码 {0})")]
  ProcessFailed(i32),
  #[error("图像尺寸超出范围: {0}")]
  DimensionOverflow(u32),
}

/// 可用的 Vulkan 设备数量
pub fn gpu_count() -> usize {
  let count = unsafe { sys::realesrgan_gpu_count() };
  count.max(0) as usize
}

/// 释放全局 Vulkan 实例；调用后不得再使用任何 `NcnnEngine`
pub fn destroy_gpu_instance() {
  unsafe { sys::realesrgan_destroy_gpu_instance() }
}

pub struct NcnnEngine {
  handle: NonNull<c_void>,
  device: Device,
}

// 原生对象只通过 &mut self 修改，process 为只读调用
unsafe impl Send for NcnnEngine {}

fn path_to_cstring(path: &Path) -> Result<CString, NcnnError> {
  let s = path.to_string_lossy().into_owned();
  CString::new(s.clone()).map_err(|_| NcnnError::InvalidPath(s))
}

fn to_c_int(value: u32) -> Result<c_int, NcnnError> {
  c_int::try_from(value).map_err(|_| NcnnError::DimensionOverflow(value))
}

impl NativeEngine for NcnnEngine {
  type Error = NcnnError;

  fn create(device: Device, tta: bool) -> Result<Self, Self::Error> {
    info!("创建 RealESRGAN 实例: 设备 {}, TTA {}", device, tta);
    let raw = unsafe { sys::realesrgan_create(device.id(), tta as c_int) };
    let handle = NonNull::new(raw).ok_or(NcnnError::CreateFailed)?;
    Ok(Self { handle, device })
  }

  fn heap_budget(&self) -> Option<u32> {
    match self.device {
      Device::Cpu => None,
      Device::Gpu(_) => {
        let budget = unsafe { sys::realesrgan_heap_budget(self.device.id()) };
        debug!("设备 {} 显存预算: {} MB", self.device, budget);
        Some(budget).filter(|&b| b > 0)
      }
    }
  }

  fn set_parameters(&mut self, tile_size: u32, scale: u32) {
    let tile_size = c_int::try_from(tile_size).unwrap_or(c_int::MAX);
    let scale = c_int::try_from(scale).unwrap_or(c_int::MAX);
    unsafe {
      sys::realesrgan_set_parameters(self.handle.as_ptr(), tile_size, scale, PREPADDING);
    }
  }

  fn load(&mut self, param_path: &Path, model_path: &Path) -> Result<(), Self::Error> {
    let param = path_to_cstring(param_path)?;
    let model = path_to_cstring(model_path)?;
    let code = unsafe { sys::realesrgan_load(self.handle.as_ptr(), param.as_ptr(), model.as_ptr()) };
    if code != 0 {
      return Err(NcnnError::LoadFailed {
        code,
        param: param_path.display().to_string(),
        model: model_path.display().to_string(),
      });
    }
    Ok(())
  }

  fn process(&self, input: &RawImage, output: &mut RawImage) -> Result<(), Self::Error> {
    let in_w = to_c_int(input.width())?;
    let in_h = to_c_int(input.height())?;
    let out_w = to_c_int(output.width())?;
    let out_h = to_c_int(output.height())?;
    let channels = to_c_int(input.channels())?;

    let code = unsafe {
      sys::realesrgan_process(
        self.handle.as_ptr(),
        input.data().as_ptr(),
        in_w,
        in_h,
        output.as_mut().as_mut_ptr(),
        out_w,
        out_h,
        channels,
      )
    };
    if code != 0 {
      return Err(NcnnError::ProcessFailed(code));
    }
    Ok(())
  }
}

impl Drop for NcnnEngine {
  fn drop(&mut self) {
    debug!("释放 RealESRGAN 实例");
    unsafe { sys::realesrgan_destroy(self.handle.as_ptr()) }
  }
}

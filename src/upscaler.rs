// 该文件是 Realesrgan-ncnn 项目的一部分。
// src/upscaler.rs - 超分门面
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
use tracing::{debug, info, warn};

use crate::engine::{Device, NativeEngine, TileSize};
use crate::frame::{FrameError, RawImage, expected_len};
use crate::model::{BuiltinModel, CUSTOM_MODEL_ID, ModelFiles, default_model_dir};

/// 未加载模型前使用的放大倍数
pub const DEFAULT_SCALE: u32 = 2;

#[derive(Error, Debug)]
pub enum UpscalerError {
  #[error("gpu id must be >= -1, got {0}")]
  InvalidGpuId(i32),
  #[error("tile size must be 0 or >= 32, got {0}")]
  InvalidTileSize(u32),
  #[error("model id must be >= -1, got {0}")]
  InvalidModelId(i32),
  #[error("unknown model id {0}")]
  UnknownModel(i32),
  #[error("param_path, model_path and scale must be specified")]
  MissingCustomModel,
  #[error("param_path and model_path must be specified")]
  MissingModelPaths,
  #[error("scale must be specified")]
  MissingScale,
  #[error("image is empty ({width}x{height})")]
  EmptyImage { width: u32, height: u32 },
  #[error("scaled size of {width}x{height} by {scale} overflows")]
  DimensionOverflow { width: u32, height: u32, scale: u32 },
  #[error("byte length {len} is not a multiple of {width}x{height}")]
  IndivisibleLength { len: usize, width: u32, height: u32 },
  #[error("unsupported pixel mode {0}")]
  UnsupportedPixelMode(String),
  #[error("unsupported channel count {0}, expected 3 (BGR) or 4 (BGRA)")]
  UnsupportedChannels(usize),
  #[error(transparent)]
  Frame(#[from] FrameError),
  #[cfg(feature = "ndarray")]
  #[error("array shape error: {0}")]
  Shape(#[from] ndarray::ShapeError),
  #[error(transparent)]
  Engine(Box<dyn std::error::Error + Send + Sync>),
}

impl UpscalerError {
  fn engine<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    UpscalerError::Engine(Box::new(err))
  }
}

/// 门面构造参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpscalerConfig {
  /// GPU 编号，-1 表示 CPU
  pub gpu_id: i32,
  /// 测试时增强
  pub tta: bool,
  /// 分块大小，0 为自动，否则不小于 32
  pub tile_size: u32,
  /// 模型编号：0-4 为预置模型，-1 为自定义模型
  pub model: i32,
  /// 预置模型所在目录
  pub model_dir: PathBuf,
}

impl Default for UpscalerConfig {
  fn default() -> Self {
    Self {
      gpu_id: 0,
      tta: false,
      tile_size: 0,
      model: 0,
      model_dir: default_model_dir(),
    }
  }
}

impl UpscalerConfig {
  pub fn gpu_id(mut self, gpu_id: i32) -> Self {
    self.gpu_id = gpu_id;
    self
  }

  pub fn tta(mut self, tta: bool) -> Self {
    self.tta = tta;
    self
  }

  pub fn tile_size(mut self, tile_size: u32) -> Self {
    self.tile_size = tile_size;
    self
  }

  pub fn model(mut self, model: i32) -> Self {
    self.model = model;
    self
  }

  pub fn model_dir(mut self, model_dir: impl Into<PathBuf>) -> Self {
    self.model_dir = model_dir.into();
    self
  }

  fn validate(&self) -> Result<(Device, TileSize, ModelMode), UpscalerError> {
    let device = Device::from_id(self.gpu_id).ok_or(UpscalerError::InvalidGpuId(self.gpu_id))?;
    let tile = TileSize::from_value(self.tile_size)
      .ok_or(UpscalerError::InvalidTileSize(self.tile_size))?;
    let mode = match self.model {
      CUSTOM_MODEL_ID => ModelMode::Custom,
      id if id < CUSTOM_MODEL_ID => return Err(UpscalerError::InvalidModelId(id)),
      id => ModelMode::Builtin(
        BuiltinModel::try_from(id).map_err(|_| UpscalerError::UnknownModel(id))?,
      ),
    };
    Ok((device, tile, mode))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelMode {
  Builtin(BuiltinModel),
  Custom,
}

/// 模型加载状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
  /// 自定义模式尚未调用 `load`，或上一次原生加载失败
  Unconfigured,
  Ready { scale: u32 },
}

/// Real-ESRGAN 超分门面。
///
/// 持有一个原生引擎句柄，负责解析模型、准备输入输出缓冲区并调用引擎。
/// 每次处理都会修改内部缓冲区，因此所有处理方法都需要 `&mut self`；
/// 需要并发时请为每个工作线程创建独立实例。
pub struct Realesrgan<E: NativeEngine> {
  engine: E,
  device: Device,
  tile: TileSize,
  mode: ModelMode,
  model_dir: PathBuf,
  state: ModelState,
  buffers: Option<Buffers>,
}

impl<E: NativeEngine> Realesrgan<E> {
  /// 校验参数并创建引擎；预置模型会在此立即加载
  pub fn new(config: UpscalerConfig) -> Result<Self, UpscalerError> {
    let (device, tile, mode) = config.validate()?;

    let engine = E::create(device, config.tta).map_err(UpscalerError::engine)?;

    let mut upscaler = Self {
      engine,
      device,
      tile,
      mode,
      model_dir: config.model_dir,
      state: ModelState::Unconfigured,
      buffers: None,
    };

    if let ModelMode::Builtin(model) = mode {
      let files = model.resolve(&upscaler.model_dir);
      upscaler.load_files(files)?;
    }

    Ok(upscaler)
  }

  pub fn state(&self) -> ModelState {
    self.state
  }

  /// 当前放大倍数，未加载时为默认值 2
  pub fn scale(&self) -> u32 {
    match self.state {
      ModelState::Ready { scale } => scale,
      ModelState::Unconfigured => DEFAULT_SCALE,
    }
  }

  pub fn device(&self) -> Device {
    self.device
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  /// 加载模型。
  ///
  /// 自定义模式下三个参数必须同时给出；预置模式下参数被忽略，重新加载预置模型。
  pub fn load(
    &mut self,
    param_path: Option<&Path>,
    model_path: Option<&Path>,
    scale: Option<u32>,
  ) -> Result<(), UpscalerError> {
    let files = match self.mode {
      ModelMode::Builtin(model) => {
        if param_path.is_some() || model_path.is_some() || scale.is_some() {
          warn!("预置模型 {} 忽略自定义加载参数", model);
        }
        model.resolve(&self.model_dir)
      }
      ModelMode::Custom => custom_files(param_path, model_path, scale)?,
    };
    self.load_files(files)
  }

  fn load_files(&mut self, files: ModelFiles) -> Result<(), UpscalerError> {
    let tile_size = self.tile.resolve(self.device, self.engine.heap_budget());
    info!(
      "加载模型: {}, {} (放大 {} 倍, 分块 {})",
      files.param_path.display(),
      files.model_path.display(),
      files.scale,
      tile_size
    );

    self.engine.set_parameters(tile_size, files.scale);
    if let Err(err) = self.engine.load(&files.param_path, &files.model_path) {
      // 引擎参数已改为新模型，旧倍数不再可信
      warn!("模型加载失败, 需重新加载: {}", err);
      self.state = ModelState::Unconfigured;
      self.buffers = None;
      return Err(UpscalerError::engine(err));
    }

    self.state = ModelState::Ready { scale: files.scale };
    Ok(())
  }

  fn ready_scale(&self) -> Result<u32, UpscalerError> {
    match self.state {
      ModelState::Ready { scale } => Ok(scale),
      ModelState::Unconfigured => Err(UpscalerError::MissingCustomModel),
    }
  }

  /// 分配新的缓冲区并推理，返回输出字节
  fn process_new(&mut self, data: Vec<u8>, width: u32, height: u32, channels: u32) -> Result<&[u8], UpscalerError> {
    let scale = self.ready_scale()?;
    let buffers = self.buffers.insert(Buffers::new(data, width, height, channels, scale)?);
    run(&self.engine, buffers)?;
    Ok(buffers.output.data())
  }

  /// 处理原始字节图像（例如来自 ffmpeg 的帧）。
  ///
  /// 尺寸不变时复用已有缓冲区，只替换输入内容；尺寸变化时重新分配。
  pub fn process_bytes(
    &mut self,
    data: &[u8],
    width: u32,
    height: u32,
    channels: u32,
  ) -> Result<Vec<u8>, UpscalerError> {
    let scale = self.ready_scale()?;
    if width == 0 || height == 0 || channels == 0 {
      return Err(UpscalerError::EmptyImage { width, height });
    }
    let expected = expected_len(width, height, channels);
    if data.len() != expected {
      return Err(
        FrameError::LengthMismatch {
          expected,
          actual: data.len(),
        }
        .into(),
      );
    }

    let buffers = match self.buffers.take() {
      Some(mut buffers) if buffers.fits(width, height, channels, scale) => {
        buffers.input.set_data(data)?;
        buffers
      }
      _ => {
        debug!("分配原始缓冲区: {}x{}x{}", width, height, channels);
        Buffers::new(data.to_vec(), width, height, channels, scale)?
      }
    };
    let buffers = self.buffers.insert(buffers);
    run(&self.engine, buffers)?;
    Ok(buffers.output.data().to_vec())
  }
}

/// 成对持有的输入输出缓冲区，输出尺寸总是输入的 `scale` 倍
struct Buffers {
  input: RawImage,
  output: RawImage,
}

impl Buffers {
  fn new(data: Vec<u8>, width: u32, height: u32, channels: u32, scale: u32) -> Result<Self, UpscalerError> {
    let (out_w, out_h) = scaled_size(width, height, scale)?;
    Ok(Self {
      input: RawImage::new(data, width, height, channels)?,
      output: RawImage::zeroed(out_w, out_h, channels),
    })
  }

  fn fits(&self, width: u32, height: u32, channels: u32, scale: u32) -> bool {
    match scaled_size(width, height, scale) {
      Ok((out_w, out_h)) => {
        self.input.has_shape(width, height, channels) && self.output.has_shape(out_w, out_h, channels)
      }
      Err(_) => false,
    }
  }
}

/// 放大后的尺寸
fn scaled_size(width: u32, height: u32, scale: u32) -> Result<(u32, u32), UpscalerError> {
  match (width.checked_mul(scale), height.checked_mul(scale)) {
    (Some(out_w), Some(out_h)) => Ok((out_w, out_h)),
    _ => Err(UpscalerError::DimensionOverflow { width, height, scale }),
  }
}

fn run<E: NativeEngine>(engine: &E, buffers: &mut Buffers) -> Result<(), UpscalerError> {
  let now = std::time::Instant::now();
  engine
    .process(&buffers.input, &mut buffers.output)
    .map_err(UpscalerError::engine)?;
  debug!(
    "推理完成: {}x{} -> {}x{}, 耗时: {:.2?}",
    buffers.input.width(),
    buffers.input.height(),
    buffers.output.width(),
    buffers.output.height(),
    now.elapsed()
  );
  Ok(())
}

fn custom_files(
  param_path: Option<&Path>,
  model_path: Option<&Path>,
  scale: Option<u32>,
) -> Result<ModelFiles, UpscalerError> {
  let scale = scale.filter(|&s| s != 0);
  match (param_path, model_path, scale) {
    (None, None, None) => Err(UpscalerError::MissingCustomModel),
    (Some(param), Some(model), Some(scale)) => Ok(ModelFiles {
      param_path: param.to_path_buf(),
      model_path: model.to_path_buf(),
      scale,
    }),
    (Some(_), Some(_), None) => Err(UpscalerError::MissingScale),
    _ => Err(UpscalerError::MissingModelPaths),
  }
}

#[cfg(feature = "image")]
fn channels_of(len: usize, width: u32, height: u32) -> Result<u32, UpscalerError> {
  let pixels = width as usize * height as usize;
  if pixels == 0 {
    return Err(UpscalerError::EmptyImage { width, height });
  }
  if len % pixels != 0 {
    return Err(UpscalerError::IndivisibleLength { len, width, height });
  }
  Ok((len / pixels) as u32)
}

#[cfg(feature = "image")]
mod image_entry {
  use image::{DynamicImage, ImageBuffer};

  use super::*;

  impl<E: NativeEngine> Realesrgan<E> {
    /// 处理 `image` 图像，返回相同像素格式、尺寸放大后的图像
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<DynamicImage, UpscalerError> {
      let scale = self.ready_scale()?;
      let (width, height) = (image.width(), image.height());

      let supported = matches!(
        image,
        DynamicImage::ImageLuma8(_)
          | DynamicImage::ImageLumaA8(_)
          | DynamicImage::ImageRgb8(_)
          | DynamicImage::ImageRgba8(_)
      );
      if !supported {
        return Err(UpscalerError::UnsupportedPixelMode(format!(
          "{:?}",
          image.color()
        )));
      }

      let bytes = image.as_bytes();
      let channels = channels_of(bytes.len(), width, height)?;
      let (out_w, out_h) = scaled_size(width, height, scale)?;
      let data = self.process_new(bytes.to_vec(), width, height, channels)?.to_vec();
      let len = data.len();
      let rebuilt = match image {
        DynamicImage::ImageLuma8(_) => ImageBuffer::from_raw(out_w, out_h, data).map(DynamicImage::ImageLuma8),
        DynamicImage::ImageLumaA8(_) => ImageBuffer::from_raw(out_w, out_h, data).map(DynamicImage::ImageLumaA8),
        DynamicImage::ImageRgb8(_) => ImageBuffer::from_raw(out_w, out_h, data).map(DynamicImage::ImageRgb8),
        _ => ImageBuffer::from_raw(out_w, out_h, data).map(DynamicImage::ImageRgba8),
      };

      rebuilt.ok_or_else(|| {
        FrameError::LengthMismatch {
          expected: expected_len(out_w, out_h, channels),
          actual: len,
        }
        .into()
      })
    }
  }
}

#[cfg(feature = "ndarray")]
mod array_entry {
  use ndarray::{Array3, ArrayView3};

  use super::*;
  use crate::frame::swap_red_blue;

  impl<E: NativeEngine> Realesrgan<E> {
    /// 处理形状为 `(行, 列, 通道)` 的 BGR/BGRA 数组图像，返回同样通道顺序的数组
    pub fn process_array(&mut self, image: ArrayView3<u8>) -> Result<Array3<u8>, UpscalerError> {
      let scale = self.ready_scale()?;
      let (rows, cols, channels) = image.dim();
      if channels != 3 && channels != 4 {
        return Err(UpscalerError::UnsupportedChannels(channels));
      }
      if rows == 0 || cols == 0 {
        return Err(UpscalerError::EmptyImage {
          width: cols as u32,
          height: rows as u32,
        });
      }

      // 按逻辑顺序收集，非连续视图也能得到行优先数据
      let mut data: Vec<u8> = image.iter().copied().collect();
      swap_red_blue(&mut data, channels);

      let (width, height, channels) = (cols as u32, rows as u32, channels as u32);
      let mut out = self.process_new(data, width, height, channels)?.to_vec();
      swap_red_blue(&mut out, channels as usize);
      let shape = (scale as usize * rows, scale as usize * cols, channels as usize);
      Ok(Array3::from_shape_vec(shape, out)?)
    }
  }
}

// 该文件是 Realesrgan-ncnn 项目的一部分。
// tests/upscaler.rs - 超分门面集成测试
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

#![cfg(all(feature = "image", feature = "ndarray"))]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, GrayAlphaImage, GrayImage, ImageBuffer, Rgb, RgbImage, RgbaImage};
use ndarray::Array3;
use tempfile::TempDir;

use realesrgan_ncnn::engine::NearestEngineError;
use realesrgan_ncnn::{
  BuiltinModel, Device, ModelState, NativeEngine, NearestEngine, RawImage, Realesrgan,
  UpscalerConfig, UpscalerError,
};

fn model_dir() -> TempDir {
  let dir = tempfile::tempdir().unwrap();
  for model in BuiltinModel::ALL {
    std::fs::write(dir.path().join(model.param_file()), b"7767517\n").unwrap();
    std::fs::write(dir.path().join(model.bin_file()), b"").unwrap();
  }
  dir
}

fn config(dir: &TempDir, model: i32) -> UpscalerConfig {
  UpscalerConfig::default()
    .gpu_id(-1)
    .model(model)
    .model_dir(dir.path())
}

fn custom_files(dir: &TempDir) -> (PathBuf, PathBuf) {
  let param = dir.path().join("custom.param");
  let bin = dir.path().join("custom.bin");
  std::fs::write(&param, b"").unwrap();
  std::fs::write(&bin, b"").unwrap();
  (param, bin)
}

fn rgb_image(width: u32, height: u32) -> DynamicImage {
  DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
    Rgb([x as u8, y as u8, (x + y) as u8])
  }))
}

#[test]
fn builtin_models_scale_output() {
  let dir = model_dir();
  for (id, expected) in [(0, 2), (1, 3), (2, 4), (3, 4), (4, 4)] {
    let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, id)).unwrap();
    assert_eq!(upscaler.scale(), expected);
    assert_eq!(upscaler.state(), ModelState::Ready { scale: expected });

    let output = upscaler.process_image(&rgb_image(5, 3)).unwrap();
    assert_eq!(output.width(), 5 * expected);
    assert_eq!(output.height(), 3 * expected);
  }
}

#[test]
fn builtin_model_loads_registry_files() {
  let dir = model_dir();
  let upscaler = Realesrgan::<NearestEngine>::new(config(&dir, 3)).unwrap();
  let (param, bin) = upscaler.engine().loaded_files().unwrap();
  assert_eq!(param, dir.path().join("realesrgan-x4plus-anime.param"));
  assert_eq!(bin, dir.path().join("realesrgan-x4plus-anime.bin"));
  assert_eq!(upscaler.engine().scale(), 4);
}

#[test]
fn custom_mode_requires_load() {
  let dir = model_dir();
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, -1)).unwrap();
  assert_eq!(upscaler.state(), ModelState::Unconfigured);
  assert_eq!(upscaler.scale(), 2);

  let err = upscaler.process_image(&rgb_image(2, 2)).unwrap_err();
  assert_eq!(err.to_string(), "param_path, model_path and scale must be specified");

  let err = upscaler.process_bytes(&[0; 12], 2, 2, 3).unwrap_err();
  assert_eq!(err.to_string(), "param_path, model_path and scale must be specified");

  let err = upscaler
    .process_array(Array3::<u8>::zeros((2, 2, 3)).view())
    .unwrap_err();
  assert_eq!(err.to_string(), "param_path, model_path and scale must be specified");
}

#[test]
fn custom_load_errors() {
  let dir = model_dir();
  let (param, bin) = custom_files(&dir);
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, -1)).unwrap();

  let err = upscaler.load(None, None, None).unwrap_err();
  assert_eq!(err.to_string(), "param_path, model_path and scale must be specified");

  let err = upscaler.load(Some(&param), None, None).unwrap_err();
  assert_eq!(err.to_string(), "param_path and model_path must be specified");

  let err = upscaler.load(Some(&param), Some(&bin), None).unwrap_err();
  assert_eq!(err.to_string(), "scale must be specified");

  let err = upscaler.load(Some(&param), Some(&bin), Some(0)).unwrap_err();
  assert_eq!(err.to_string(), "scale must be specified");

  assert_eq!(upscaler.state(), ModelState::Unconfigured);
  assert!(upscaler.engine().loaded_files().is_none());
}

#[test]
fn custom_load_then_process() {
  let dir = model_dir();
  let (param, bin) = custom_files(&dir);
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, -1)).unwrap();

  // 失败的加载不影响后续使用
  assert!(upscaler.load(Some(&param), None, Some(3)).is_err());
  upscaler.load(Some(&param), Some(&bin), Some(3)).unwrap();

  assert_eq!(upscaler.state(), ModelState::Ready { scale: 3 });
  assert_eq!(upscaler.engine().loaded_files(), Some((param.as_path(), bin.as_path())));

  let output = upscaler.process_image(&rgb_image(4, 2)).unwrap();
  assert_eq!((output.width(), output.height()), (12, 6));
}

#[test]
fn failed_native_load_requires_reload() {
  let dir = model_dir();
  let (param, bin) = custom_files(&dir);
  let missing = dir.path().join("missing.bin");
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, -1)).unwrap();

  upscaler.load(Some(&param), Some(&bin), Some(2)).unwrap();
  assert_eq!(upscaler.process_bytes(&[1; 12], 2, 2, 3).unwrap().len(), 48);

  let err = upscaler.load(Some(&param), Some(&missing), Some(4)).unwrap_err();
  assert!(matches!(err, UpscalerError::Engine(_)));
  assert_eq!(upscaler.state(), ModelState::Unconfigured);

  // 不能再按旧倍数分配输出
  let err = upscaler.process_bytes(&[1; 12], 2, 2, 3).unwrap_err();
  assert_eq!(err.to_string(), "param_path, model_path and scale must be specified");
  assert!(upscaler.process_image(&rgb_image(2, 2)).is_err());

  upscaler.load(Some(&param), Some(&bin), Some(4)).unwrap();
  let output = upscaler.process_bytes(&[1; 12], 2, 2, 3).unwrap();
  assert_eq!(output.len(), 8 * 8 * 3);
  assert!(output.iter().all(|&b| b == 1));
}

#[test]
fn failed_builtin_reload_requires_reload() {
  let dir = model_dir();
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, 2)).unwrap();
  let bin = dir.path().join(BuiltinModel::AnimeVideoV3X4.bin_file());
  std::fs::remove_file(&bin).unwrap();

  assert!(upscaler.load(None, None, None).is_err());
  assert_eq!(upscaler.state(), ModelState::Unconfigured);
  assert!(upscaler.process_bytes(&[0; 3], 1, 1, 3).is_err());

  std::fs::write(&bin, b"").unwrap();
  upscaler.load(None, None, None).unwrap();
  assert_eq!(upscaler.process_bytes(&[0; 3], 1, 1, 3).unwrap().len(), 4 * 4 * 3);
}

#[test]
fn builtin_load_ignores_custom_arguments() {
  let dir = model_dir();
  let (param, bin) = custom_files(&dir);
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, 0)).unwrap();

  upscaler.load(Some(&param), Some(&bin), Some(4)).unwrap();
  assert_eq!(upscaler.scale(), 2);
  let (loaded, _) = upscaler.engine().loaded_files().unwrap();
  assert_eq!(loaded, dir.path().join("realesr-animevideov3-x2.param"));
}

#[test]
fn missing_model_files_propagate_engine_error() {
  let dir = tempfile::tempdir().unwrap();
  let err = Realesrgan::<NearestEngine>::new(config(&dir, 0))
    .err()
    .unwrap();
  let inner = match err {
    UpscalerError::Engine(inner) => inner,
    other => panic!("unexpected error: {other}"),
  };
  assert!(matches!(
    inner.downcast_ref::<NearestEngineError>(),
    Some(NearestEngineError::ModelFile { .. })
  ));
}

#[test]
fn structured_image_keeps_pixel_mode() {
  let dir = model_dir();
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, 1)).unwrap();

  let images = [
    DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 2, image::Luma([9]))),
    DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(3, 2, image::LumaA([9, 200]))),
    rgb_image(3, 2),
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]))),
  ];

  for input in images {
    let output = upscaler.process_image(&input).unwrap();
    assert_eq!(output.color(), input.color());
    assert_eq!((output.width(), output.height()), (9, 6));
    assert_eq!(output.as_bytes().len(), 9 * input.as_bytes().len());
  }
}

#[test]
fn structured_image_pixels_are_replicated() {
  let dir = model_dir();
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, 0)).unwrap();
  let input = rgb_image(3, 2);
  let output = upscaler.process_image(&input).unwrap().into_rgb8();
  let input = input.into_rgb8();
  for (x, y, pixel) in output.enumerate_pixels() {
    assert_eq!(pixel, input.get_pixel(x / 2, y / 2));
  }
}

#[test]
fn unsupported_pixel_mode_is_rejected() {
  let dir = model_dir();
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, 0)).unwrap();
  let image = DynamicImage::ImageRgb16(ImageBuffer::new(2, 2));
  assert!(matches!(
    upscaler.process_image(&image),
    Err(UpscalerError::UnsupportedPixelMode(_))
  ));
}

#[test]
fn array_image_keeps_channel_order() {
  let dir = model_dir();
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, 0)).unwrap();

  // BGR 纯蓝
  let mut input = Array3::<u8>::zeros((2, 3, 3));
  input.slice_mut(ndarray::s![.., .., 0]).fill(255);

  let output = upscaler.process_array(input.view()).unwrap();
  assert_eq!(output.dim(), (4, 6, 3));
  for pixel in output.rows() {
    assert_eq!(pixel.to_vec(), vec![255, 0, 0]);
  }
}

#[test]
fn array_image_rejects_gray() {
  let dir = model_dir();
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, 0)).unwrap();
  let input = Array3::<u8>::zeros((2, 2, 1));
  assert!(matches!(
    upscaler.process_array(input.view()),
    Err(UpscalerError::UnsupportedChannels(1))
  ));
}

#[test]
fn identical_configs_give_identical_sizes() {
  let dir = model_dir();
  let mut a = Realesrgan::<NearestEngine>::new(config(&dir, 2)).unwrap();
  let mut b = Realesrgan::<NearestEngine>::new(config(&dir, 2)).unwrap();
  let input = rgb_image(7, 5);
  let out_a = a.process_image(&input).unwrap();
  let out_b = b.process_image(&input).unwrap();
  assert_eq!(out_a.dimensions(), out_b.dimensions());
  assert_eq!(out_a.dimensions(), (28, 20));
}

#[test]
fn raw_buffer_reuse() {
  let dir = model_dir();
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, 0)).unwrap();

  let first = upscaler.process_bytes(&[1; 4 * 3 * 3], 4, 3, 3).unwrap();
  assert_eq!(first.len(), 8 * 6 * 3);
  assert!(first.iter().all(|&b| b == 1));

  let second = upscaler.process_bytes(&[2; 4 * 3 * 3], 4, 3, 3).unwrap();
  assert_eq!(second.len(), 8 * 6 * 3);
  assert!(second.iter().all(|&b| b == 2));
}

#[test]
fn raw_buffer_dimension_change_reinitializes() {
  let dir = model_dir();
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, 1)).unwrap();

  upscaler.process_bytes(&[5; 2 * 2 * 3], 2, 2, 3).unwrap();
  let output = upscaler.process_bytes(&[6; 5 * 4 * 4], 5, 4, 4).unwrap();
  assert_eq!(output.len(), 15 * 12 * 4);
  assert!(output.iter().all(|&b| b == 6));
}

#[test]
fn raw_buffer_length_is_checked() {
  let dir = model_dir();
  let mut upscaler = Realesrgan::<NearestEngine>::new(config(&dir, 0)).unwrap();
  assert!(matches!(
    upscaler.process_bytes(&[0; 10], 2, 2, 3),
    Err(UpscalerError::Frame(_))
  ));
  assert!(matches!(
    upscaler.process_bytes(&[], 0, 2, 3),
    Err(UpscalerError::EmptyImage { .. })
  ));
  // 失败后仍可正常处理
  assert_eq!(upscaler.process_bytes(&[0; 12], 2, 2, 3).unwrap().len(), 48);
}

#[test]
fn tile_size_boundaries() {
  let dir = model_dir();

  let upscaler = Realesrgan::<NearestEngine>::new(config(&dir, 0).tile_size(32)).unwrap();
  assert_eq!(upscaler.engine().tile_size(), 32);

  let upscaler = Realesrgan::<NearestEngine>::new(config(&dir, 0).tile_size(0)).unwrap();
  assert_eq!(upscaler.engine().tile_size(), 400);

  assert!(matches!(
    Realesrgan::<NearestEngine>::new(config(&dir, 0).tile_size(31)),
    Err(UpscalerError::InvalidTileSize(31))
  ));
}

#[test]
fn invalid_construction_arguments() {
  let dir = model_dir();
  assert!(matches!(
    Realesrgan::<NearestEngine>::new(config(&dir, 0).gpu_id(-2)),
    Err(UpscalerError::InvalidGpuId(-2))
  ));
  assert!(matches!(
    Realesrgan::<NearestEngine>::new(config(&dir, -2)),
    Err(UpscalerError::InvalidModelId(-2))
  ));
  assert!(matches!(
    Realesrgan::<NearestEngine>::new(config(&dir, 5)),
    Err(UpscalerError::UnknownModel(5))
  ));
}

/// 记录引擎收到的输入，并报告固定显存预算
struct RecordingEngine {
  device: Device,
  tile_size: u32,
  scale: u32,
  last_input: RefCell<Vec<u8>>,
}

#[derive(Debug, thiserror::Error)]
#[error("recording engine failure")]
struct RecordingError;

impl NativeEngine for RecordingEngine {
  type Error = RecordingError;

  fn create(device: Device, _tta: bool) -> Result<Self, Self::Error> {
    Ok(Self {
      device,
      tile_size: 0,
      scale: 1,
      last_input: RefCell::new(Vec::new()),
    })
  }

  fn heap_budget(&self) -> Option<u32> {
    match self.device {
      Device::Cpu => None,
      Device::Gpu(_) => Some(600),
    }
  }

  fn set_parameters(&mut self, tile_size: u32, scale: u32) {
    self.tile_size = tile_size;
    self.scale = scale;
  }

  fn load(&mut self, _param_path: &Path, _model_path: &Path) -> Result<(), Self::Error> {
    Ok(())
  }

  fn process(&self, input: &RawImage, output: &mut RawImage) -> Result<(), Self::Error> {
    *self.last_input.borrow_mut() = input.data().to_vec();
    let channels = input.channels() as usize;
    let first = input.data()[..channels].to_vec();
    for pixel in output.as_mut().chunks_exact_mut(channels) {
      pixel.copy_from_slice(&first);
    }
    Ok(())
  }
}

#[test]
fn auto_tile_size_uses_heap_budget() {
  let dir = model_dir();
  let upscaler = Realesrgan::<RecordingEngine>::new(config(&dir, 0).gpu_id(0)).unwrap();
  assert_eq!(upscaler.engine().tile_size, 100);
  assert_eq!(upscaler.engine().scale, 2);
}

#[test]
fn array_image_is_swapped_for_engine() {
  let dir = model_dir();
  let mut upscaler = Realesrgan::<RecordingEngine>::new(config(&dir, 0)).unwrap();

  let mut input = Array3::<u8>::zeros((1, 1, 4));
  input[[0, 0, 0]] = 10; // B
  input[[0, 0, 1]] = 20; // G
  input[[0, 0, 2]] = 30; // R
  input[[0, 0, 3]] = 40; // A

  let output = upscaler.process_array(input.view()).unwrap();
  assert_eq!(*upscaler.engine().last_input.borrow(), vec![30, 20, 10, 40]);
  assert_eq!(output.dim(), (2, 2, 4));
  assert_eq!(output.slice(ndarray::s![1, 1, ..]).to_vec(), vec![10, 20, 30, 40]);
}

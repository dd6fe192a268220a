// 该文件是 Realesrgan-ncnn 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复推理性能测试
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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use image::ImageReader;
use tracing::info;

use realesrgan_ncnn::{
  BuiltinModel, DefaultEngine, Realesrgan, UpscalerConfig,
  task::{RepeatShotTask, Task},
};

/// 重复推理性能测试参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像路径
  #[arg(long, value_name = "FILE")]
  pub input: PathBuf,
  /// 预置模型（编号或名称）
  #[arg(long, default_value = "realesr-animevideov3-x2", value_name = "MODEL")]
  pub model: BuiltinModel,
  /// 预置模型目录
  #[arg(long, value_name = "DIR")]
  pub model_dir: Option<PathBuf>,
  /// GPU 编号，-1 表示 CPU
  #[arg(long, default_value = "0", allow_negative_numbers = true, value_name = "ID")]
  pub gpu_id: i32,
  /// 重复次数
  #[arg(long, default_value = "100", value_name = "COUNT")]
  pub times: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入图像: {}", args.input.display());
  info!("模型: {}", args.model);

  let mut config = UpscalerConfig::default()
    .gpu_id(args.gpu_id)
    .model(args.model.id());
  if let Some(dir) = args.model_dir {
    config = config.model_dir(dir);
  }
  let mut upscaler = Realesrgan::<DefaultEngine>::new(config)?;

  let image = ImageReader::open(&args.input)
    .with_context(|| format!("无法打开图片文件: {}", args.input.display()))?
    .decode()
    .with_context(|| format!("无法解码图片文件: {}", args.input.display()))?;

  let mean = RepeatShotTask::new(args.times).run_task(std::iter::once(image), &mut upscaler)?;
  println!("平均推理时间: {:.2?}", mean);

  Ok(())
}

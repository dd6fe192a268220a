// 该文件是 Realesrgan-ncnn 项目的一部分。
// src/main.rs - 项目主程序
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
use url::Url;

use realesrgan_ncnn::{
  BuiltinModel, DefaultEngine, FromUrl, ModelSource, Realesrgan, UpscalerConfig,
  model::default_model_dir,
  task::{OneShotTask, Task},
};

/// Real-ESRGAN 图像超分
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像路径
  #[arg(long, value_name = "FILE", required_unless_present = "list_models")]
  pub input: Option<PathBuf>,

  /// 输出图像路径
  #[arg(long, value_name = "FILE", required_unless_present = "list_models")]
  pub output: Option<PathBuf>,

  /// 模型来源
  /// - 预置模型: builtin:0 .. builtin:4 或 builtin:<模型名>
  /// - 自定义模型: ncnn:///path/to/x.param?bin=/path/to/x.bin&scale=4
  #[arg(long, value_name = "MODEL", default_value = "builtin:0")]
  pub model: Url,

  /// 预置模型目录
  #[arg(long, value_name = "DIR")]
  pub model_dir: Option<PathBuf>,

  /// GPU 编号，-1 表示 CPU
  #[arg(long, default_value = "0", allow_negative_numbers = true, value_name = "ID")]
  pub gpu_id: i32,

  /// 分块大小，0 表示自动
  #[arg(long, default_value = "0", value_name = "SIZE")]
  pub tile_size: u32,

  /// 启用测试时增强
  #[arg(long)]
  pub tta: bool,

  /// 以 JSON 打印预置模型列表后退出
  #[arg(long)]
  pub list_models: bool,
}

fn list_models(model_dir: &std::path::Path) -> Result<()> {
  let models: Vec<_> = BuiltinModel::ALL
    .iter()
    .map(|model| {
      let files = model.resolve(model_dir);
      serde_json::json!({
        "id": model.id(),
        "name": model.name(),
        "scale": model.scale(),
        "param": files.param_path,
        "bin": files.model_path,
        "available": files.param_path.exists() && files.model_path.exists(),
      })
    })
    .collect();
  println!("{}", serde_json::to_string_pretty(&models)?);
  Ok(())
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let model_dir = args.model_dir.clone().unwrap_or_else(default_model_dir);

  if args.list_models {
    return list_models(&model_dir);
  }

  let input = args.input.context("缺少输入路径")?;
  let output = args.output.context("缺少输出路径")?;

  info!("输入图像: {}", input.display());
  info!("输出图像: {}", output.display());
  info!("模型来源: {}", args.model);

  let source = ModelSource::from_url(&args.model)?;
  let config = UpscalerConfig::default()
    .gpu_id(args.gpu_id)
    .tta(args.tta)
    .tile_size(args.tile_size)
    .model(source.model_id())
    .model_dir(model_dir);

  let mut upscaler = Realesrgan::<DefaultEngine>::new(config)?;
  if let ModelSource::Custom {
    param_path,
    model_path,
    scale,
  } = &source
  {
    upscaler.load(param_path.as_deref(), model_path.as_deref(), *scale)?;
  }

  let image = ImageReader::open(&input)
    .with_context(|| format!("无法打开图片文件: {}", input.display()))?
    .decode()
    .with_context(|| format!("无法解码图片文件: {}", input.display()))?;

  let result = OneShotTask.run_task(std::iter::once(image), &mut upscaler)?;

  if let Some(parent) = output.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  result
    .save(&output)
    .with_context(|| format!("无法保存图片文件: {}", output.display()))?;
  info!("保存图像到文件: {}", output.display());

  Ok(())
}

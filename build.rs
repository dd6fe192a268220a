// 该文件是 Realesrgan-ncnn 项目的一部分。
// build.rs - 原生引擎 C ABI 封装的构建脚本
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

use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
  println!("cargo:rerun-if-changed=build.rs");
  println!("cargo:rerun-if-env-changed=REALESRGAN_NCNN_VULKAN_DIR");
  println!("cargo:rerun-if-env-changed=NCNN_DIR");
  println!("cargo:rerun-if-env-changed=NCNN_EXTRA_LIBS");

  // 只有启用 ncnn 特性时才编译原生封装
  if env::var_os("CARGO_FEATURE_NCNN").is_none() {
    return Ok(());
  }

  println!("cargo:rerun-if-changed=ncnn/realesrgan_c.cpp");

  // realesrgan-ncnn-vulkan 源码树，需已通过 cmake 生成着色器头文件
  let realesrgan_dir = env::var("REALESRGAN_NCNN_VULKAN_DIR")
    .map(PathBuf::from)
    .map_err(|_| "启用 ncnn 特性时必须设置 REALESRGAN_NCNN_VULKAN_DIR")?;
  // ncnn 安装目录（包含 include/ncnn 与 lib）
  let ncnn_dir = env::var("NCNN_DIR")
    .map(PathBuf::from)
    .map_err(|_| "启用 ncnn 特性时必须设置 NCNN_DIR")?;

  let src_dir = realesrgan_dir.join("src");
  let generated_dir = realesrgan_dir.join("build");
  if !src_dir.join("realesrgan.h").exists() {
    return Err(format!("找不到 realesrgan.h: {}", src_dir.display()).into());
  }

  cc::Build::new()
    .cpp(true)
    .std("c++11")
    .file("ncnn/realesrgan_c.cpp")
    .file(src_dir.join("realesrgan.cpp"))
    .include(&src_dir)
    .include(&generated_dir)
    .include(ncnn_dir.join("include").join("ncnn"))
    .flag_if_supported("-fopenmp")
    .warnings(false)
    .compile("realesrgan_c");

  println!(
    "cargo:rustc-link-search=native={}",
    ncnn_dir.join("lib").display()
  );
  println!("cargo:rustc-link-lib=ncnn");

  // 静态链接 ncnn 时还需要 glslang、vulkan 等依赖，以逗号分隔
  if let Ok(extra) = env::var("NCNN_EXTRA_LIBS") {
    for lib in extra.split(',').map(str::trim).filter(|s| !s.is_empty()) {
      println!("cargo:rustc-link-lib={}", lib);
    }
  }

  Ok(())
}

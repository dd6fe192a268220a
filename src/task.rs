// 该文件是 Realesrgan-ncnn 项目的一部分。
// src/task.rs - 超分任务
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

use std::time::Duration;

use image::DynamicImage;
use tracing::{info, warn};

use crate::engine::NativeEngine;
use crate::upscaler::Realesrgan;

pub trait Task<I, E: NativeEngine>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, upscaler: &mut Realesrgan<E>) -> Result<Self::Output, Self::Error>;
}

/// 处理输入中的第一帧，返回放大后的图像
pub struct OneShotTask;

impl<I: Iterator<Item = DynamicImage>, E: NativeEngine> Task<I, E> for OneShotTask {
  type Output = DynamicImage;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, upscaler: &mut Realesrgan<E>) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功 ({}x{})，开始推理...", frame.width(), frame.height());
    let now = std::time::Instant::now();
    let result = upscaler.process_image(&frame)?;
    info!(
      "推理完成 ({}x{})，耗时: {:.2?}",
      result.width(),
      result.height(),
      now.elapsed()
    );
    Ok(result)
  }
}

/// 以原始字节路径反复处理同一帧，返回除预热外的平均耗时
pub struct RepeatShotTask {
  times: usize,
}

/// 前两次视为预热，不计入平均值
const WARMUP_TIMES: usize = 2;

impl RepeatShotTask {
  pub fn new(times: usize) -> Self {
    Self {
      times: times.max(WARMUP_TIMES + 1),
    }
  }
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self::new(100)
  }
}

impl<I: Iterator<Item = DynamicImage>, E: NativeEngine> Task<I, E> for RepeatShotTask {
  type Output = Duration;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, upscaler: &mut Realesrgan<E>) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input
      .next()
      .ok_or_else(|| anyhow::anyhow!("没有输入帧"))?
      .into_rgb8();
    let (width, height) = frame.dimensions();
    let bytes = frame.into_raw();
    info!("输入帧获取成功 ({}x{})，开始推理...", width, height);

    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = std::time::Instant::now();
      let output = upscaler.process_bytes(&bytes, width, height, 3)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，输出 {} 字节，耗时: {:.2?}", i, output.len(), elapsed);
      times.push(elapsed);
    }

    let mean = times.iter().skip(WARMUP_TIMES).sum::<Duration>() / (times.len() - WARMUP_TIMES) as u32;
    warn!("平均推理时间: {:.2?}", mean);

    Ok(mean)
  }
}

// 该文件是 Realesrgan-ncnn 项目的一部分。
// src/model.rs - 预置模型表与模型来源
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
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::FromUrl;

/// 模型目录环境变量
pub const MODEL_DIR_ENV: &str = "REALESRGAN_NCNN_MODELS";

/// 自定义模型的编号
pub const CUSTOM_MODEL_ID: i32 = -1;

/// 预置模型目录：优先读取环境变量，否则为包目录下的 `models`
pub fn default_model_dir() -> PathBuf {
  std::env::var_os(MODEL_DIR_ENV)
    .map(PathBuf::from)
    .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("models"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinModel {
  AnimeVideoV3X2,
  AnimeVideoV3X3,
  AnimeVideoV3X4,
  X4PlusAnime,
  X4Plus,
}

impl BuiltinModel {
  pub const ALL: [BuiltinModel; 5] = [
    BuiltinModel::AnimeVideoV3X2,
    BuiltinModel::AnimeVideoV3X3,
    BuiltinModel::AnimeVideoV3X4,
    BuiltinModel::X4PlusAnime,
    BuiltinModel::X4Plus,
  ];

  pub fn id(self) -> i32 {
    match self {
      BuiltinModel::AnimeVideoV3X2 => 0,
      BuiltinModel::AnimeVideoV3X3 => 1,
      BuiltinModel::AnimeVideoV3X4 => 2,
      BuiltinModel::X4PlusAnime => 3,
      BuiltinModel::X4Plus => 4,
    }
  }

  /// 模型文件名（不含扩展名）
  pub fn name(self) -> &'static str {
    match self {
      BuiltinModel::AnimeVideoV3X2 => "realesr-animevideov3-x2",
      BuiltinModel::AnimeVideoV3X3 => "realesr-animevideov3-x3",
      BuiltinModel::AnimeVideoV3X4 => "realesr-animevideov3-x4",
      BuiltinModel::X4PlusAnime => "realesrgan-x4plus-anime",
      BuiltinModel::X4Plus => "realesrgan-x4plus",
    }
  }

  pub fn scale(self) -> u32 {
    match self {
      BuiltinModel::AnimeVideoV3X2 => 2,
      BuiltinModel::AnimeVideoV3X3 => 3,
      BuiltinModel::AnimeVideoV3X4 => 4,
      BuiltinModel::X4PlusAnime => 4,
      BuiltinModel::X4Plus => 4,
    }
  }

  pub fn param_file(self) -> String {
    format!("{}.param", self.name())
  }

  pub fn bin_file(self) -> String {
    format!("{}.bin", self.name())
  }

  pub fn resolve(self, model_dir: &Path) -> ModelFiles {
    let files = ModelFiles {
      param_path: model_dir.join(self.param_file()),
      model_path: model_dir.join(self.bin_file()),
      scale: self.scale(),
    };
    debug!("预置模型 {} 解析为 {:?}", self.name(), files);
    files
  }
}

impl fmt::Display for BuiltinModel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModelSourceError {
  #[error("unknown model id {0}")]
  UnknownId(i32),
  #[error("unknown model name '{0}'")]
  UnknownName(String),
  #[error("invalid scale '{0}'")]
  InvalidScale(String),
  #[error("URI scheme mismatch: '{0}'")]
  SchemeMismatch(String),
}

impl TryFrom<i32> for BuiltinModel {
  type Error = ModelSourceError;

  fn try_from(id: i32) -> Result<Self, Self::Error> {
    BuiltinModel::ALL
      .into_iter()
      .find(|model| model.id() == id)
      .ok_or(ModelSourceError::UnknownId(id))
  }
}

impl FromStr for BuiltinModel {
  type Err = ModelSourceError;

  /// 接受模型编号或模型名
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if let Ok(id) = s.parse::<i32>() {
      return BuiltinModel::try_from(id);
    }
    BuiltinModel::ALL
      .into_iter()
      .find(|model| model.name() == s)
      .ok_or_else(|| ModelSourceError::UnknownName(s.to_string()))
  }
}

/// 一对已解析的模型文件及其放大倍数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
  pub param_path: PathBuf,
  pub model_path: PathBuf,
  pub scale: u32,
}

/// 模型来源，可以从 URL 构造：
///
/// - `builtin:<编号或名称>`，例如 `builtin:2`、`builtin:realesrgan-x4plus`
/// - `ncnn://<param 路径>?bin=<bin 路径>&scale=<倍数>`
///
/// 自定义来源的字段允许缺省，缺失项在加载时报告。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
  Builtin(BuiltinModel),
  Custom {
    param_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    scale: Option<u32>,
  },
}

const BUILTIN_SCHEME: &str = "builtin";
const NCNN_SCHEME: &str = "ncnn";

impl ModelSource {
  /// 对应的模型编号，自定义模型为 -1
  pub fn model_id(&self) -> i32 {
    match self {
      ModelSource::Builtin(model) => model.id(),
      ModelSource::Custom { .. } => CUSTOM_MODEL_ID,
    }
  }

  fn builtin_from_url(url: &Url) -> Result<Self, ModelSourceError> {
    let name = match url.host_str() {
      Some(host) if !host.is_empty() => host,
      _ => url.path().trim_matches('/'),
    };
    Ok(ModelSource::Builtin(name.parse()?))
  }

  fn custom_from_url(url: &Url) -> Result<Self, ModelSourceError> {
    let param_path = Some(url.path())
      .filter(|path| !path.is_empty())
      .map(PathBuf::from);

    let mut model_path = None;
    let mut scale = None;
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "bin" if !value.is_empty() => model_path = Some(PathBuf::from(value.as_ref())),
        "scale" => {
          let parsed = value
            .parse::<u32>()
            .map_err(|_| ModelSourceError::InvalidScale(value.to_string()))?;
          scale = Some(parsed);
        }
        _ => {}
      }
    }

    Ok(ModelSource::Custom {
      param_path,
      model_path,
      scale,
    })
  }
}

impl FromUrl for ModelSource {
  type Error = ModelSourceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      BUILTIN_SCHEME => Self::builtin_from_url(url),
      NCNN_SCHEME => Self::custom_from_url(url),
      other => Err(ModelSourceError::SchemeMismatch(other.to_string())),
    }
  }
}

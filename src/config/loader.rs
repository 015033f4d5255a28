use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::HydraRouterConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "hydra-router.yaml",
    "config/hydra-router.yaml",
    "hydra-router.toml",
    "config/hydra-router.toml",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置失败 {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("解析配置失败 {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("不支持的配置格式: {path}")]
    UnsupportedFormat { path: PathBuf },
}

/// 显式路径优先；否则依次查找默认路径，都不存在时使用默认配置。
pub fn load_config(path: Option<PathBuf>) -> Result<HydraRouterConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            return Ok(config);
        }
    }

    Ok(HydraRouterConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<HydraRouterConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config(&contents, path).map(Some)
}

pub fn parse_config(contents: &str, path: &Path) -> Result<HydraRouterConfig, ConfigError> {
    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => {
            serde_yaml::from_str(contents).map_err(|err| parse_error(err.to_string()))
        }
        Some("toml") => toml::from_str(contents).map_err(|err| parse_error(err.to_string())),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

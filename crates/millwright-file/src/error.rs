//! 文件操作错误定义

use millwright_core::error::ConfigurationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid machine definition: {0}")]
    InvalidDefinition(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Machine configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

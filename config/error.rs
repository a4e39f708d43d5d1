//! Configuration Error Types
//!
//! Các loại lỗi khi tải và kiểm tra cấu hình onboarding.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

/// Các lỗi liên quan đến cấu hình
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigError {
    /// Lỗi IO khi đọc file
    IoError(String),

    /// Lỗi phân tích cú pháp (json/toml/yaml)
    ParseError(String),

    /// Trường bắt buộc bị thiếu
    MissingField(String),

    /// Giá trị không hợp lệ (thường từ biến môi trường)
    InvalidValue(String),

    /// File cấu hình không tồn tại
    FileNotFound(String),

    /// Lỗi xác thực cấu hình
    ValidationError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {}", field),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
            ConfigError::FileNotFound(path) => write!(f, "Configuration file not found: {}", path),
            ConfigError::ValidationError(msg) => write!(f, "Configuration validation error: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(error: io::Error) -> Self {
        ConfigError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError::ParseError(format!("JSON parse error: {}", error))
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::ParseError(format!("TOML parse error: {}", error))
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(error: serde_yaml::Error) -> Self {
        ConfigError::ParseError(format!("YAML parse error: {}", error))
    }
}

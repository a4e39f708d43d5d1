//! # Onboarding Logs Module
//!
//! Khởi tạo `tracing-subscriber` từ `LoggingConfig` và định nghĩa các log
//! category (tracing target) mà onboarding core dùng.
//!
//! - `nodes`: admission test, onboarding state, timing guidance
//! - `participants`: thay đổi participant state

use std::io::Write;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::errors::{OnboardingError, Result};

/// Log category, tương ứng với tracing target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Nodes,
    Participants,
}

impl LogCategory {
    pub const fn target(self) -> &'static str {
        match self {
            LogCategory::Nodes => "nodes",
            LogCategory::Participants => "participants",
        }
    }
}

/// Target cho log admission test, onboarding state, timing guidance
pub const NODES: &str = LogCategory::Nodes.target();
/// Target cho log participant state
pub const PARTICIPANTS: &str = LogCategory::Participants.target();

fn build_filter(logging: &LoggingConfig) -> Result<EnvFilter> {
    // RUST_LOG thắng cấu hình file nếu được đặt
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&logging.level)
        .map_err(|e| OnboardingError::ConfigError(format!("Invalid log filter '{}': {}", logging.level, e)))
}

/// Cài global subscriber, gọi một lần lúc khởi động
///
/// Lỗi nếu filter không hợp lệ, file log không mở được hoặc đã có subscriber.
pub fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = build_filter(logging)?;
    let ansi = logging.format == "ansi";

    match &logging.log_file {
        Some(file_path) => {
            // Mở thử để báo lỗi sớm
            std::fs::OpenOptions::new().create(true).append(true).open(file_path)?;

            let file_path_owned = file_path.clone();
            let writer = move || -> Box<dyn Write + Send + 'static> {
                match std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&file_path_owned)
                {
                    Ok(f) => Box::new(f),
                    Err(e) => {
                        eprintln!("Warning: Could not open log file: {}", e);
                        Box::new(std::io::stderr())
                    }
                }
            };

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .map_err(|e| OnboardingError::ConfigError(format!("Cannot install logger: {}", e)))?;

            info!("Logging initialized with file: {}", file_path);
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(ansi)
                .try_init()
                .map_err(|e| OnboardingError::ConfigError(format!("Cannot install logger: {}", e)))?;

            info!("Logging initialized with level: {}", logging.level);
        }
    }
    Ok(())
}

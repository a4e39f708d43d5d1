//! # Onboarding Configuration
//!
//! Cấu hình tập trung cho onboarding core: admission test, status text,
//! scheduler, logging, admin API và danh sách node.
//!
//! ## Cách sử dụng
//!
//! ```no_run
//! use onboarding::config::OnboardingConfig;
//!
//! let config = OnboardingConfig::load("configs/onboarding.yaml").unwrap_or_default();
//! assert!(config.admission.sample_inference);
//! ```
//!
//! Mọi section đều có giá trị mặc định, nên một file cấu hình chỉ cần khai báo
//! những gì khác mặc định (thường là `nodes`).

pub mod error;
pub mod loader;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use crate::config::error::ConfigError;
pub use crate::config::loader::{ConfigFormat, ConfigLoader, ConfigLoaderOptions};
use crate::node_manager::{
    NodeConfig, AUTO_TEST_MIN_SECONDS, DEFAULT_BLOCK_TIME_SECONDS, NODE_NOTIFY_TIMEOUT_SECS,
    POC_URGENT_WINDOW_SECONDS,
};

/// Đường dẫn cấu hình mặc định của binary
pub const DEFAULT_CONFIG_PATH: &str = "configs/onboarding.yaml";

/// Cấu hình tổng
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnboardingConfig {
    /// Admission test
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Status message rendering
    #[serde(default)]
    pub status: StatusConfig,

    /// Auto-test scheduler
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Admin API
    #[serde(default)]
    pub api: ApiConfig,

    /// Command broker
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Version segment chèn vào PoC URL của node, rỗng nếu không có
    #[serde(default)]
    pub node_version: String,

    /// Danh sách node cần quản lý
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

/// Cấu hình admission test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Auto-test chỉ chạy khi countdown lớn hơn ngưỡng này (giây)
    #[serde(default = "default_auto_test_threshold")]
    pub auto_test_threshold_secs: i64,

    /// Block time danh nghĩa của chain
    #[serde(default = "default_block_time")]
    pub block_time_seconds: f64,

    /// Chạy bước sample inference
    #[serde(default = "default_true")]
    pub sample_inference: bool,

    /// Báo TEST_FAILED trực tiếp cho node khi test thất bại
    #[serde(default = "default_true")]
    pub notify_node_on_failure: bool,

    /// Timeout cho thông báo trực tiếp tới node
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,

    /// Timeout của HTTP client tới node
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Deadline cho từng stage, không giới hạn nếu None
    #[serde(default)]
    pub stage_timeout_secs: Option<u64>,

    /// Nội dung message của sample inference
    #[serde(default = "default_sample_prompt")]
    pub sample_prompt: String,

    #[serde(default = "default_sample_max_tokens")]
    pub sample_max_tokens: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            auto_test_threshold_secs: default_auto_test_threshold(),
            block_time_seconds: default_block_time(),
            sample_inference: true,
            notify_node_on_failure: true,
            notify_timeout_secs: default_notify_timeout(),
            request_timeout_secs: default_request_timeout(),
            stage_timeout_secs: None,
            sample_prompt: default_sample_prompt(),
            sample_max_tokens: default_sample_max_tokens(),
        }
    }
}

impl AdmissionConfig {
    /// Biến thể rút gọn: chỉ load model và health, không báo node
    pub fn reduced() -> Self {
        Self {
            sample_inference: false,
            notify_node_on_failure: false,
            ..Self::default()
        }
    }
}

/// Cấu hình cho status text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Trong cửa sổ này trước PoC, node phải online
    #[serde(default = "default_urgent_window")]
    pub urgent_window_secs: i64,

    /// Chỉ hiện guidance "no model" khi countdown lớn hơn ngưỡng này.
    /// Luôn bằng `admission.auto_test_threshold_secs`, không đọc từ file.
    #[serde(skip, default = "default_auto_test_threshold")]
    pub guidance_threshold_secs: i64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            urgent_window_secs: default_urgent_window(),
            guidance_threshold_secs: default_auto_test_threshold(),
        }
    }
}

/// Cấu hình auto-test scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Chu kỳ kiểm tra (giây)
    #[serde(default = "default_scheduler_interval")]
    pub interval_secs: u64,

    /// Block height hiện tại lúc khởi động, nếu biết
    #[serde(default)]
    pub current_block: Option<u64>,

    /// Block height bắt đầu PoC kế tiếp, nếu biết
    #[serde(default)]
    pub next_poc_block: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_scheduler_interval(),
            current_block: None,
            next_poc_block: None,
        }
    }
}

/// Cấu hình logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Cấp độ log hoặc EnvFilter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "ansi" hoặc "plain"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// File log, stdout nếu None
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_file: None,
        }
    }
}

/// Cấu hình admin API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_api_host")]
    pub host: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

/// Cấu hình command broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_capacity")]
    pub capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            capacity: default_broker_capacity(),
        }
    }
}

// Helper functions for default values
fn default_true() -> bool { true }
fn default_auto_test_threshold() -> i64 { AUTO_TEST_MIN_SECONDS }
fn default_urgent_window() -> i64 { POC_URGENT_WINDOW_SECONDS }
fn default_block_time() -> f64 { DEFAULT_BLOCK_TIME_SECONDS }
fn default_notify_timeout() -> u64 { NODE_NOTIFY_TIMEOUT_SECS }
fn default_request_timeout() -> u64 { 30 }
fn default_sample_prompt() -> String { "Hello, how are you?".to_string() }
fn default_sample_max_tokens() -> u32 { 10 }
fn default_scheduler_interval() -> u64 { 60 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "ansi".to_string() }
fn default_api_host() -> String { "127.0.0.1".to_string() }
fn default_api_port() -> u16 { 9200 }
fn default_broker_capacity() -> usize { crate::messaging::broker::DEFAULT_COMMAND_CAPACITY }

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl OnboardingConfig {
    /// Tạo mới một đối tượng OnboardingConfig mặc định
    pub fn new() -> Self {
        Self::default()
    }

    /// Tải cấu hình từ file, env và kiểm tra tính hợp lệ
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let loader = ConfigLoader::new();
        loader.load_all(path.as_ref())
    }

    /// Đồng bộ ngưỡng guidance với gate của admission test
    pub fn sync_guidance_threshold(&mut self) {
        self.status.guidance_threshold_secs = self.admission.auto_test_threshold_secs;
    }

    /// Kiểm tra tính hợp lệ của cấu hình
    pub fn validate(&self) -> Result<(), ConfigError> {
        debug!("Validating onboarding configuration");

        let admission = &self.admission;
        if admission.auto_test_threshold_secs < 0 {
            return Err(ConfigError::ValidationError(
                "admission.auto_test_threshold_secs must not be negative".to_string(),
            ));
        }
        if admission.block_time_seconds.is_nan() || admission.block_time_seconds <= 0.0 {
            return Err(ConfigError::ValidationError(
                "admission.block_time_seconds must be positive".to_string(),
            ));
        }
        if admission.notify_timeout_secs == 0 || admission.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "admission timeouts must be at least 1 second".to_string(),
            ));
        }
        if admission.stage_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "admission.stage_timeout_secs must be at least 1 second when set".to_string(),
            ));
        }
        if admission.sample_inference && admission.sample_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "admission.sample_max_tokens must be positive".to_string(),
            ));
        }

        if self.status.urgent_window_secs < 0 {
            return Err(ConfigError::ValidationError(
                "status.urgent_window_secs must not be negative".to_string(),
            ));
        }
        if self.status.guidance_threshold_secs != admission.auto_test_threshold_secs {
            return Err(ConfigError::ValidationError(format!(
                "status.guidance_threshold_secs ({}) must equal admission.auto_test_threshold_secs ({})",
                self.status.guidance_threshold_secs, admission.auto_test_threshold_secs
            )));
        }

        if self.scheduler.enabled && self.scheduler.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.interval_secs must be positive".to_string(),
            ));
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) && !level.contains('=') {
            return Err(ConfigError::ValidationError(format!(
                "unknown log level: {}",
                self.logging.level
            )));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(ConfigError::MissingField("nodes[].id".to_string()));
            }
            if node.host.trim().is_empty() {
                return Err(ConfigError::MissingField(format!("nodes[{}].host", node.id)));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate node id: {}",
                    node.id
                )));
            }
        }

        debug!("Onboarding configuration is valid");
        Ok(())
    }
}

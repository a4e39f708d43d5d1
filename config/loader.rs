//! Configuration Loader
//!
//! Tải `OnboardingConfig` từ file (json/toml/yaml theo phần mở rộng) rồi ghi đè
//! bằng biến môi trường có prefix (mặc định `ONBOARDING_`).

use std::env;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::config::{ConfigError, OnboardingConfig};

/// Các định dạng file cấu hình được hỗ trợ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format
    Json,
    /// TOML format
    Toml,
    /// YAML format
    Yaml,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(path: &str) -> ConfigFormat {
        if path.ends_with(".toml") {
            ConfigFormat::Toml
        } else if path.ends_with(".yaml") || path.ends_with(".yml") {
            ConfigFormat::Yaml
        } else {
            // Default to JSON
            ConfigFormat::Json
        }
    }
}

/// Tùy chọn cho ConfigLoader
#[derive(Debug, Clone)]
pub struct ConfigLoaderOptions {
    /// Apply environment overrides
    pub load_env: bool,
    /// Environment variable prefix
    pub env_prefix: String,
}

impl Default for ConfigLoaderOptions {
    fn default() -> Self {
        Self {
            load_env: true,
            env_prefix: "ONBOARDING_".to_string(),
        }
    }
}

/// ConfigLoader tải cấu hình từ nhiều nguồn
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Tạo một ConfigLoader mới với tùy chọn mặc định
    pub fn new() -> Self {
        Self {
            options: ConfigLoaderOptions::default(),
        }
    }

    /// Tạo một ConfigLoader mới với tùy chọn tùy chỉnh
    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    /// Đọc cấu hình từ file, không áp env và không validate
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<OnboardingConfig, ConfigError> {
        let path_ref = path.as_ref();
        debug!("[ConfigLoader] Loading configuration from file: {:?}", path_ref);

        if !path_ref.exists() {
            error!("[ConfigLoader] Configuration file not found: {:?}", path_ref);
            return Err(ConfigError::FileNotFound(path_ref.to_string_lossy().to_string()));
        }

        let content = fs::read_to_string(path_ref)?;
        let format = ConfigFormat::from_extension(&path_ref.to_string_lossy());
        let mut config: OnboardingConfig = self.parse_content(&content, format)?;
        config.sync_guidance_threshold();

        info!("[ConfigLoader] Configuration loaded from file: {:?}", path_ref);
        Ok(config)
    }

    /// Phân tích nội dung cấu hình theo định dạng
    pub fn parse_content<T: DeserializeOwned>(&self, content: &str, format: ConfigFormat) -> Result<T, ConfigError> {
        match format {
            ConfigFormat::Json => Ok(serde_json::from_str(content)?),
            ConfigFormat::Toml => Ok(toml::from_str(content)?),
            ConfigFormat::Yaml => Ok(serde_yaml::from_str(content)?),
        }
    }

    /// Tải cấu hình từ tất cả các nguồn (file, env), rồi validate
    ///
    /// File không tồn tại thì dùng cấu hình mặc định.
    pub fn load_all<P: AsRef<Path>>(&self, config_path: P) -> Result<OnboardingConfig, ConfigError> {
        let config_path = config_path.as_ref();
        debug!("[ConfigLoader] Loading configuration from all sources");

        let mut config = if config_path.exists() {
            self.load_from_file(config_path)?
        } else {
            info!("[ConfigLoader] Config file {:?} not found, using defaults", config_path);
            OnboardingConfig::default()
        };

        if self.options.load_env {
            self.override_from_env(&mut config)?;
        }
        config.sync_guidance_threshold();

        config.validate()?;

        info!(
            "[ConfigLoader] Configuration ready: {} node(s), scheduler {}",
            config.nodes.len(),
            if config.scheduler.enabled { "enabled" } else { "disabled" }
        );
        Ok(config)
    }

    /// Ghi đè cấu hình từ biến môi trường
    fn override_from_env(&self, config: &mut OnboardingConfig) -> Result<(), ConfigError> {
        // Admission
        if let Some(value) = self.env_parse::<i64>("AUTO_TEST_THRESHOLD_SECS")? {
            config.admission.auto_test_threshold_secs = value;
        }
        if let Some(value) = self.env_parse::<f64>("BLOCK_TIME_SECONDS")? {
            config.admission.block_time_seconds = value;
        }
        if let Some(value) = self.env_var("SAMPLE_INFERENCE") {
            config.admission.sample_inference = self.parse_bool(&value)?;
        }
        if let Some(value) = self.env_var("NOTIFY_NODE_ON_FAILURE") {
            config.admission.notify_node_on_failure = self.parse_bool(&value)?;
        }
        if let Some(value) = self.env_parse::<u64>("NOTIFY_TIMEOUT_SECS")? {
            config.admission.notify_timeout_secs = value;
        }
        if let Some(value) = self.env_parse::<u64>("REQUEST_TIMEOUT_SECS")? {
            config.admission.request_timeout_secs = value;
        }
        if let Some(value) = self.env_parse::<u64>("STAGE_TIMEOUT_SECS")? {
            config.admission.stage_timeout_secs = Some(value);
        }

        // Scheduler
        if let Some(value) = self.env_var("SCHEDULER_ENABLED") {
            config.scheduler.enabled = self.parse_bool(&value)?;
        }
        if let Some(value) = self.env_parse::<u64>("SCHEDULER_INTERVAL_SECS")? {
            config.scheduler.interval_secs = value;
        }

        // Admin API
        if let Some(host) = self.env_var("API_HOST") {
            config.api.host = host;
        }
        if let Some(port) = self.env_parse::<u16>("API_PORT")? {
            config.api.port = port;
        }

        if let Some(version) = self.env_var("NODE_VERSION") {
            config.node_version = version;
        }

        // Logging config
        if let Some(level) = self.env_var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = self.env_var("LOG_FORMAT") {
            config.logging.format = format;
        }
        if let Some(log_file) = self.env_var("LOG_FILE") {
            config.logging.log_file = Some(log_file);
        }

        Ok(())
    }

    fn env_var(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", self.options.env_prefix, key)).ok()
    }

    fn env_parse<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.env_var(key) {
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
                ConfigError::InvalidValue(format!("{}{}={}", self.options.env_prefix, key, raw))
            }),
            None => Ok(None),
        }
    }

    /// Parse boolean value from string
    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" | "enabled" => Ok(true),
            "false" | "no" | "0" | "off" | "disabled" => Ok(false),
            _ => Err(ConfigError::InvalidValue(format!("Cannot parse as boolean: {}", value))),
        }
    }
}

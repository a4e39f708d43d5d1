//! # Onboarding Error Management
//!
//! Module này định nghĩa enum lỗi tập trung cho onboarding core và taxonomy
//! lỗi của admission test.
//!
//! ## Cách sử dụng
//!
//! ```rust
//! use onboarding::errors::{OnboardingError, Result};
//!
//! fn some_function() -> Result<()> {
//!     Err(OnboardingError::ValidationError("Invalid input".to_string()))
//! }
//! ```
//!
//! `AdmissionFailure` không bao giờ được trả ra ngoài như một lỗi: runner
//! chuyển nó thành cặp `(FAILED, error)` trong `TestOutcome`.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warp::reject::Reject;

use crate::config::error::ConfigError;
use crate::infra::service_traits::ServiceError;
use crate::messaging::broker::QueueError;

/// Kết quả chung cho toàn bộ onboarding core
pub type Result<T> = std::result::Result<T, OnboardingError>;

pub const HEALTH_NOT_OK: &str = "health_not_ok";
pub const NON_SUCCESS_STATUS_CODE: &str = "non_success_status_code";
pub const NODE_NOT_FOUND: &str = "node_not_found";
pub const DEADLINE_EXCEEDED: &str = "deadline_exceeded";
pub const NO_MODELS_CONFIGURED: &str = "no_models_configured";

/// Enum lỗi tập trung
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "error_type", content = "error_details")]
pub enum OnboardingError {
    /// Lỗi cấu hình
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Lỗi từ collaborator (node, config store)
    #[error("Service error: {0}")]
    ServiceError(String),

    /// Lỗi command queue
    #[error("Queue error: {0}")]
    QueueError(String),

    /// Lỗi xác thực đầu vào
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Lỗi không tìm thấy
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Lỗi IO
    #[error("IO error: {0}")]
    IoError(String),

    /// Lỗi phân tích JSON
    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl OnboardingError {
    /// Lỗi này có phải lỗi validation không
    pub fn is_validation_error(&self) -> bool {
        matches!(self, OnboardingError::ValidationError(_) | OnboardingError::ConfigError(_))
    }

    /// Mã lỗi HTTP tương ứng cho admin API
    pub fn status_code(&self) -> u16 {
        match self {
            OnboardingError::ValidationError(_) => 422,
            OnboardingError::NotFoundError(_) => 404,
            OnboardingError::ServiceError(_) => 502,
            OnboardingError::QueueError(_) => 503,
            _ => 500,
        }
    }

    /// Log lỗi này
    pub fn log(&self) {
        use tracing::{error, warn};

        match self {
            OnboardingError::ValidationError(msg) => {
                warn!(error_type = "validation", message = %msg, "Validation error");
            }
            OnboardingError::NotFoundError(msg) => {
                warn!(error_type = "not_found", message = %msg, "Not found error");
            }
            _ => {
                error!(error_type = ?self, message = %self, "Onboarding error");
            }
        }
    }
}

impl From<io::Error> for OnboardingError {
    fn from(err: io::Error) -> Self {
        OnboardingError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for OnboardingError {
    fn from(err: serde_json::Error) -> Self {
        OnboardingError::JsonError(err.to_string())
    }
}

impl From<ConfigError> for OnboardingError {
    fn from(err: ConfigError) -> Self {
        OnboardingError::ConfigError(err.to_string())
    }
}

impl From<ServiceError> for OnboardingError {
    fn from(err: ServiceError) -> Self {
        OnboardingError::ServiceError(err.to_string())
    }
}

impl From<QueueError> for OnboardingError {
    fn from(err: QueueError) -> Self {
        OnboardingError::QueueError(err.to_string())
    }
}

// Cho phép dùng với warp::reject::custom
impl Reject for OnboardingError {}

/// Phân loại lỗi của một lần admission test
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AdmissionFailure {
    /// Model không load được
    #[error("model '{model}' failed to load: {message}")]
    ModelLoad { model: String, message: String },

    /// Health check không gọi được
    #[error("health check failed: {0}")]
    HealthTransport(String),

    /// Node trả lời nhưng báo không healthy
    #[error("node reported unhealthy")]
    HealthNotOk,

    /// Không dựng được request sample inference
    #[error("could not build sample inference request: {0}")]
    RequestBuild(String),

    /// Sample inference không hoàn tất
    #[error("sample inference request failed: {0}")]
    InferenceTransport(String),

    /// Sample inference trả về status ngoài 2xx
    #[error("sample inference returned status {0}")]
    InferenceStatus(u16),

    /// Manual test cho node id không tồn tại
    #[error("node not found")]
    NodeNotFound,
}

impl AdmissionFailure {
    /// Text lưu trong `TestOutcome.error` và gửi làm failure reason, luôn khác rỗng
    pub fn reason(&self) -> String {
        let reason = match self {
            AdmissionFailure::ModelLoad { message, .. } => message.as_str(),
            AdmissionFailure::HealthTransport(message) => message.as_str(),
            AdmissionFailure::HealthNotOk => HEALTH_NOT_OK,
            AdmissionFailure::RequestBuild(message) => message.as_str(),
            AdmissionFailure::InferenceTransport(message) => message.as_str(),
            AdmissionFailure::InferenceStatus(_) => NON_SUCCESS_STATUS_CODE,
            AdmissionFailure::NodeNotFound => NODE_NOT_FOUND,
        };
        if reason.is_empty() {
            self.kind().to_string()
        } else {
            reason.to_string()
        }
    }

    /// Tên ngắn của loại lỗi
    pub fn kind(&self) -> &'static str {
        match self {
            AdmissionFailure::ModelLoad { .. } => "model_load_error",
            AdmissionFailure::HealthTransport(_) => "health_transport_error",
            AdmissionFailure::HealthNotOk => HEALTH_NOT_OK,
            AdmissionFailure::RequestBuild(_) => "request_build_error",
            AdmissionFailure::InferenceTransport(_) => "inference_transport_error",
            AdmissionFailure::InferenceStatus(_) => NON_SUCCESS_STATUS_CODE,
            AdmissionFailure::NodeNotFound => NODE_NOT_FOUND,
        }
    }

    /// Model gây lỗi, rỗng nếu lỗi không gắn với model
    pub fn failing_model(&self) -> &str {
        match self {
            AdmissionFailure::ModelLoad { model, .. } => model,
            _ => "",
        }
    }
}

pub mod admission;
pub mod node_client;
pub mod scheduler;
pub mod status_reporter;

// Các type dùng chung giữa admission runner và status reporter
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Chỉ auto-test khi còn hơn 1 giờ tới PoC kế tiếp
pub const AUTO_TEST_MIN_SECONDS: i64 = 3600;

/// Trong 10 phút cuối trước PoC node phải online
pub const POC_URGENT_WINDOW_SECONDS: i64 = 600;

/// Nominal block time of the chain, used to turn block distances into seconds
pub const DEFAULT_BLOCK_TIME_SECONDS: f64 = 6.0;

/// Upper bound for the direct TEST_FAILED notification sent to a node
pub const NODE_NOTIFY_TIMEOUT_SECS: u64 = 5;

/// OnboardingState: vòng đời admission của một node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingState {
    /// Idle, eligible to be tested or to compute
    WaitingForPoc,
    /// Admission protocol in flight
    Testing,
    /// Last admission attempt failed
    TestFailed,
}

impl OnboardingState {
    pub const ALL: [OnboardingState; 3] = [
        OnboardingState::WaitingForPoc,
        OnboardingState::Testing,
        OnboardingState::TestFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingState::WaitingForPoc => "WAITING_FOR_POC",
            OnboardingState::Testing => "TESTING",
            OnboardingState::TestFailed => "TEST_FAILED",
        }
    }
}

impl fmt::Display for OnboardingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnboardingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OnboardingState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown onboarding state: {}", s))
    }
}

/// ParticipantState: participant đã vào active set hay chưa
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantState {
    /// Chưa nằm trong active set
    InactiveWaiting,
    /// Đang tham gia active set
    ActiveParticipating,
}

impl ParticipantState {
    pub const ALL: [ParticipantState; 2] = [
        ParticipantState::InactiveWaiting,
        ParticipantState::ActiveParticipating,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantState::InactiveWaiting => "INACTIVE_WAITING",
            ParticipantState::ActiveParticipating => "ACTIVE_PARTICIPATING",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ParticipantState::ActiveParticipating)
    }
}

impl fmt::Display for ParticipantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParticipantState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown participant state: {}", s))
    }
}

/// Launch arguments for one model on a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub args: Vec<String>,
}

/// NodeConfig: cấu hình của một ML node
///
/// Models are kept in a `BTreeMap` so iteration is sorted by model id. The
/// load stage walks them in that order and the sample inference targets the
/// smallest id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    pub host: String,
    pub inference_port: u16,
    #[serde(default)]
    pub inference_segment: String,
    pub poc_port: u16,
    #[serde(default)]
    pub poc_segment: String,
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
}

impl NodeConfig {
    /// Tạo NodeConfig mới không có model
    pub fn new(id: &str, host: &str, inference_port: u16, poc_port: u16) -> Self {
        Self {
            id: id.to_string(),
            host: host.to_string(),
            inference_port,
            inference_segment: String::new(),
            poc_port,
            poc_segment: String::new(),
            models: BTreeMap::new(),
        }
    }

    /// Thêm model với launch arguments
    pub fn with_model(mut self, model_id: &str, args: &[&str]) -> Self {
        let args = args.iter().map(|arg| arg.to_string()).collect();
        self.models.insert(model_id.to_string(), ModelConfig { args });
        self
    }

    pub fn with_segments(mut self, inference_segment: &str, poc_segment: &str) -> Self {
        self.inference_segment = inference_segment.to_string();
        self.poc_segment = poc_segment.to_string();
        self
    }

    /// URL của inference server trên node
    pub fn inference_url(&self) -> String {
        format_url(&self.host, self.inference_port, &self.inference_segment)
    }

    /// URL của admission/PoC API, có chèn version nếu config source báo version
    pub fn poc_url(&self, version: &str) -> String {
        let version = version.trim_matches('/');
        if version.is_empty() {
            return format_url(&self.host, self.poc_port, &self.poc_segment);
        }
        format!(
            "http://{}:{}/{}{}",
            self.host,
            self.poc_port,
            version,
            normalize_segment(&self.poc_segment)
        )
    }

    /// Model đầu tiên theo thứ tự id
    pub fn first_model_id(&self) -> Option<&str> {
        self.models.keys().next().map(|id| id.as_str())
    }
}

/// Ghép host, port và path segment thành base URL (không có '/' ở cuối)
pub fn format_url(host: &str, port: u16, segment: &str) -> String {
    format!("http://{}:{}{}", host, port, normalize_segment(segment))
}

fn normalize_segment(segment: &str) -> String {
    let trimmed = segment.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

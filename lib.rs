//! Onboarding core cho ML node: admission test trước chu kỳ PoC và status text
//! cho operator. Xem `manifest` để biết cấu trúc domain.

pub mod api;
pub mod config;
pub mod errors;
pub mod infra;
pub mod logs;
pub mod manifest;
pub mod messaging;
pub mod node_manager;

pub use errors::{AdmissionFailure, OnboardingError, Result};
pub use node_manager::admission::{AdmissionTestRunner, TestMetrics, TestOutcome, TestStatus};
pub use node_manager::status_reporter::{format_short_duration, StatusReporter};
pub use node_manager::{NodeConfig, OnboardingState, ParticipantState};

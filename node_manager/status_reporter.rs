//! # Status Reporter
//!
//! Dựng status text cho operator từ onboarding state, participant state và
//! countdown tới PoC kế tiếp. Không gọi mạng, không đụng queue, chỉ log qua
//! `tracing` (target `nodes` / `participants`).

use tracing::info;

use crate::config::StatusConfig;
use crate::logs::{NODES, PARTICIPANTS};
use crate::node_manager::{OnboardingState, ParticipantState};

/// Dựng message trạng thái cho node và participant
#[derive(Debug, Clone, Default)]
pub struct StatusReporter {
    config: StatusConfig,
}

impl StatusReporter {
    pub fn new(config: StatusConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StatusConfig {
        &self.config
    }

    /// Message cho onboarding state của ML node
    pub fn build_onboarding_message(
        &self,
        state: OnboardingState,
        seconds_until_next_cycle: i64,
        failing_model: &str,
    ) -> String {
        match state {
            OnboardingState::Testing => "Testing MLnode configuration - model loading in progress".to_string(),
            OnboardingState::TestFailed => {
                if failing_model.is_empty() {
                    "MLnode test failed".to_string()
                } else {
                    format!("MLnode test failed: model '{}' could not be loaded", failing_model)
                }
            }
            OnboardingState::WaitingForPoc => {
                let countdown = format_short_duration(seconds_until_next_cycle);
                if seconds_until_next_cycle <= self.config.urgent_window_secs {
                    format!("PoC starting soon (in {}) - MLnode must be online now", countdown)
                } else {
                    format!(
                        "Waiting for next PoC cycle (starts in {}) - you can safely turn off the server and restart it {} before PoC",
                        countdown,
                        describe_span(self.config.urgent_window_secs)
                    )
                }
            }
        }
    }

    /// Như `build_onboarding_message` nhưng nhận state dạng wire string,
    /// state không nhận ra cho message rỗng
    pub fn build_onboarding_message_raw(&self, state: &str, seconds_until_next_cycle: i64, failing_model: &str) -> String {
        match state.parse::<OnboardingState>() {
            Ok(state) => self.build_onboarding_message(state, seconds_until_next_cycle, failing_model),
            Err(_) => String::new(),
        }
    }

    pub fn build_participant_message(&self, state: ParticipantState) -> String {
        match state {
            ParticipantState::ActiveParticipating => "Participant is in active set and participating".to_string(),
            ParticipantState::InactiveWaiting => {
                "Participant not yet active - model assignment will occur after joining active set".to_string()
            }
        }
    }

    pub fn build_participant_message_raw(&self, state: &str) -> String {
        match state.parse::<ParticipantState>() {
            Ok(state) => self.build_participant_message(state),
            Err(_) => String::new(),
        }
    }

    /// Participant chưa active thì không cần hướng dẫn test node
    pub fn should_suppress_no_model_guidance(&self, participant_active: bool) -> bool {
        !participant_active
    }

    /// Hướng dẫn khi node chưa có model, chỉ hiện khi cửa sổ auto-test đang mở
    pub fn build_no_model_guidance(&self, seconds_until_next_cycle: i64) -> String {
        if seconds_until_next_cycle > self.config.guidance_threshold_secs {
            format!(
                "MLnode will be tested automatically when there is more than {} until next PoC",
                describe_span(self.config.guidance_threshold_secs)
            )
        } else {
            String::new()
        }
    }

    pub fn log_onboarding_transition(&self, prev: OnboardingState, next: OnboardingState) {
        info!(target: NODES, prev = %prev, next = %next, "Onboarding state transition");
    }

    pub fn log_testing(&self, message: &str) {
        info!(target: NODES, "{}", message);
    }

    pub fn log_participant_status_change(&self, prev: ParticipantState, next: ParticipantState) {
        info!(target: PARTICIPANTS, prev = %prev, next = %next, "Participant status change");
    }

    pub fn log_timing_guidance(&self, seconds_until_next_cycle: i64) {
        info!(target: NODES, seconds_until_next_poc = seconds_until_next_cycle, "Timing guidance");
    }
}

/// Rút gọn số giây thành chuỗi ngắn: "0s", "1h 1m", "2h", "1m 30s", "45s"
///
/// Khi có giờ thì bỏ phần giây.
pub fn format_short_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "0s".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    match (hours, minutes, secs) {
        (h, 0, _) if h > 0 => format!("{}h", h),
        (h, m, _) if h > 0 => format!("{}h {}m", h, m),
        (_, 0, s) => format!("{}s", s),
        (_, m, 0) => format!("{}m", m),
        (_, m, s) => format!("{}m {}s", m, s),
    }
}

// "1 hour", "10 minutes"; khoảng lẻ thì dùng dạng ngắn
fn describe_span(seconds: i64) -> String {
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {}", unit)
        } else {
            format!("{} {}s", n, unit)
        }
    };
    if seconds > 0 && seconds % 3600 == 0 {
        plural(seconds / 3600, "hour")
    } else if seconds > 0 && seconds % 60 == 0 {
        plural(seconds / 60, "minute")
    } else {
        format_short_duration(seconds)
    }
}

// =========================
// ONBOARDING DOMAIN MANIFEST
// =========================

//! 🧭 Domain Onboarding: kiểm tra ML node trước khi cho tham gia chu kỳ PoC và
//! dựng status text cho operator.
//!
//! # Cấu trúc Domain
//!
//! ```text
//! ./
//! ├── config/
//! │   ├── error.rs
//! │   ├── loader.rs
//! │   └── mod.rs
//! ├── infra/
//! │   ├── service_mocks.rs
//! │   ├── service_traits.rs
//! │   └── mod.rs
//! ├── node_manager/
//! │   ├── admission.rs
//! │   ├── node_client.rs
//! │   ├── scheduler.rs
//! │   ├── status_reporter.rs
//! │   └── mod.rs
//! ├── messaging/
//! │   ├── broker.rs
//! │   └── mod.rs
//! ├── logs/
//! │   └── mod.rs
//! ├── tests/
//! │   └── admission_integration.rs
//! ├── api.rs
//! ├── errors.rs
//! ├── main.rs
//! ├── lib.rs
//! └── manifest.rs
//! ```
//!
//! # Mô tả chức năng từng module
//!
//! - **config/**
//!     - `mod.rs`: `OnboardingConfig` và các section (`AdmissionConfig`, `StatusConfig`,
//!       `SchedulerConfig`, `LoggingConfig`, `ApiConfig`, `BrokerConfig`), `validate()`.
//!     - `loader.rs`: `ConfigLoader` - đọc json/toml/yaml theo phần mở rộng, ghi đè bằng env `ONBOARDING_*`.
//!     - `error.rs`: `ConfigError`.
//! - **infra/**
//!     - `service_traits.rs`: trait cho collaborator: `NodeConfigSource`, `NodeClient`,
//!       `NodeClientFactory`, `CompletionSender`, `CommandQueue`, và `ServiceError`.
//!     - `service_mocks.rs`: implementation static/in-memory cho test và dev.
//! - **node_manager/**
//!     - `mod.rs`: `NodeConfig`, `OnboardingState`, `ParticipantState`, các hằng số thời gian.
//!     - `admission.rs`: `AdmissionTestRunner` (load model → health → sample inference), `TestOutcome`.
//!     - `status_reporter.rs`: `StatusReporter`, `format_short_duration`.
//!     - `scheduler.rs`: `AutoTestScheduler`, trait `PocCountdown`, `BlockHeightCountdown`.
//!     - `node_client.rs`: `HttpNodeClient`, `HttpNodeClientFactory`, `HttpCompletionSender` (reqwest).
//! - **messaging/**
//!     - `broker.rs`: `NodeCommand`, `CommandBroker` trên tokio mpsc.
//! - **logs/**
//!     - `mod.rs`: `init_logging`, `LogCategory` (target `nodes` / `participants`).
//! - **errors.rs**: `OnboardingError` tập trung và taxonomy `AdmissionFailure`.
//! - **api.rs**: admin routes (warp) dưới `/admin/v1`.
//! - **main.rs**: load config, init logging, ghép các service, chạy scheduler và admin API.
//!
//! # Mối liên hệ module
//!
//! - **node_manager::admission** chỉ nói chuyện với bên ngoài qua trait trong **infra**.
//! - **messaging** nhận command TEST_FAILED / failure reason / WAITING_FOR_POC từ runner.
//! - **node_manager::status_reporter** chỉ phụ thuộc các state enum, không gọi mạng.
//! - **node_manager::scheduler** ghép countdown + runner + reporter thành vòng lặp định kỳ.
//! - **api** là entrypoint cho operator, ánh xạ tới runner và reporter.

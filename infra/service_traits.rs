//! # Service Traits
//!
//! Tập hợp các trait chuẩn cho các collaborator bên ngoài của onboarding core.
//! Admission runner chỉ nói chuyện với node, config store và command queue qua
//! các trait này, nên test có thể thay bằng mock/in-memory implementation.
//!
//! ## Cách sử dụng
//!
//! ```
//! use std::sync::Arc;
//! use onboarding::infra::service_traits::{NodeConfigSource, CommandQueue};
//! use onboarding::infra::service_mocks::{StaticNodeConfigSource, InMemoryCommandQueue};
//!
//! let source: Arc<dyn NodeConfigSource> = Arc::new(StaticNodeConfigSource::new(vec![], ""));
//! let queue: Arc<dyn CommandQueue> = Arc::new(InMemoryCommandQueue::new());
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messaging::broker::{NodeCommand, QueueError};
use crate::node_manager::{NodeConfig, OnboardingState};

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Resource not found: {0}")]
    NotFoundError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Nguồn cấu hình node (config store bên ngoài, read-only với core)
#[async_trait]
pub trait NodeConfigSource: Send + Sync + 'static {
    /// All configured nodes, in the store's iteration order
    async fn get_nodes(&self) -> Vec<NodeConfig>;
    /// Version segment inserted into the node's PoC URL, empty if none
    async fn get_current_node_version(&self) -> String;
}

/// Client gọi vào admission/inference API của một node
#[async_trait]
pub trait NodeClient: Send + Sync + 'static {
    /// Load a model with its launch arguments
    async fn inference_up(&self, model_id: &str, args: &[String]) -> Result<(), ServiceError>;
    /// Check the inference server, `Ok(false)` means the node answered but is not healthy
    async fn inference_health(&self) -> Result<bool, ServiceError>;
    /// Push a state (and reason) straight to the node
    async fn set_node_state(&self, state: OnboardingState, reason: &str) -> Result<(), ServiceError>;
}

/// Builds a node client per test run from the node's PoC and inference URLs
pub trait NodeClientFactory: Send + Sync + 'static {
    fn create(&self, poc_url: &str, inference_url: &str) -> Arc<dyn NodeClient>;
}

/// Sends the sample chat-completion request, returns the HTTP status code
#[async_trait]
pub trait CompletionSender: Send + Sync + 'static {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16, ServiceError>;
}

/// Command queue (broker) nhận các lệnh thay đổi trạng thái node
#[async_trait]
pub trait CommandQueue: Send + Sync + 'static {
    /// Hand a command to the queue without waiting for delivery
    async fn submit(&self, command: NodeCommand) -> Result<(), QueueError>;
}

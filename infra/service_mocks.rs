//! # Service Mocks
//!
//! Các implementation đơn giản (in-memory/static) cho các trait trong
//! `service_traits`. `StaticNodeConfigSource` cũng là config source mặc định
//! của binary (node list đọc từ file cấu hình).
//!
//! ## Cách sử dụng
//!
//! ```
//! use onboarding::infra::service_mocks::InMemoryCommandQueue;
//! use onboarding::infra::service_traits::CommandQueue;
//! use onboarding::messaging::NodeCommand;
//! use onboarding::node_manager::OnboardingState;
//!
//! let queue = InMemoryCommandQueue::new();
//! tokio_test::block_on(queue.submit(NodeCommand::set_onboarding_state("node-1", OnboardingState::Testing))).unwrap();
//! assert_eq!(tokio_test::block_on(queue.commands()).len(), 1);
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::infra::service_traits::{
    CommandQueue, CompletionSender, NodeClient, NodeClientFactory, NodeConfigSource, ServiceError,
};
use crate::messaging::broker::{NodeCommand, QueueError};
use crate::node_manager::NodeConfig;

/// Config source với danh sách node cố định
pub struct StaticNodeConfigSource {
    nodes: Vec<NodeConfig>,
    version: String,
}

impl StaticNodeConfigSource {
    pub fn new(nodes: Vec<NodeConfig>, version: &str) -> Self {
        Self {
            nodes,
            version: version.to_string(),
        }
    }
}

#[async_trait]
impl NodeConfigSource for StaticNodeConfigSource {
    async fn get_nodes(&self) -> Vec<NodeConfig> {
        self.nodes.clone()
    }

    async fn get_current_node_version(&self) -> String {
        self.version.clone()
    }
}

/// Command queue ghi lại mọi command, có thể bật chế độ reject để test lỗi
pub struct InMemoryCommandQueue {
    /// Commands received so far, in submission order
    pub commands: Arc<tokio::sync::Mutex<Vec<NodeCommand>>>,
    reject: AtomicBool,
}

impl InMemoryCommandQueue {
    pub fn new() -> Self {
        Self {
            commands: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            reject: AtomicBool::new(false),
        }
    }

    /// Queue từ chối mọi command
    pub fn rejecting() -> Self {
        let queue = Self::new();
        queue.reject.store(true, Ordering::SeqCst);
        queue
    }

    pub async fn commands(&self) -> Vec<NodeCommand> {
        self.commands.lock().await.clone()
    }
}

impl Default for InMemoryCommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandQueue for InMemoryCommandQueue {
    async fn submit(&self, command: NodeCommand) -> Result<(), QueueError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(QueueError::Rejected(format!("queue unavailable for node {}", command.node_id())));
        }
        info!("[InMemoryCommandQueue] Command for node {}", command.node_id());
        self.commands.lock().await.push(command);
        Ok(())
    }
}

/// Factory luôn trả về cùng một client và ghi lại các URL đã dùng
pub struct FixedNodeClientFactory {
    client: Arc<dyn NodeClient>,
    /// (poc_url, inference_url) pairs, one per `create` call
    pub created: std::sync::Mutex<Vec<(String, String)>>,
}

impl FixedNodeClientFactory {
    pub fn new(client: Arc<dyn NodeClient>) -> Self {
        Self {
            client,
            created: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn created_urls(&self) -> Vec<(String, String)> {
        match self.created.lock() {
            Ok(created) => created.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NodeClientFactory for FixedNodeClientFactory {
    fn create(&self, poc_url: &str, inference_url: &str) -> Arc<dyn NodeClient> {
        match self.created.lock() {
            Ok(mut created) => created.push((poc_url.to_string(), inference_url.to_string())),
            Err(poisoned) => poisoned
                .into_inner()
                .push((poc_url.to_string(), inference_url.to_string())),
        }
        self.client.clone()
    }
}

/// Completion sender trả về status cố định và đếm số lần gọi
pub struct StaticCompletionSender {
    status: Result<u16, ServiceError>,
    calls: AtomicUsize,
    /// Last URL and body posted
    pub last_request: std::sync::Mutex<Option<(String, Vec<u8>)>>,
}

impl StaticCompletionSender {
    pub fn with_status(status: u16) -> Self {
        Self {
            status: Ok(status),
            calls: AtomicUsize::new(0),
            last_request: std::sync::Mutex::new(None),
        }
    }

    pub fn failing(error: ServiceError) -> Self {
        Self {
            status: Err(error),
            calls: AtomicUsize::new(0),
            last_request: std::sync::Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(String, Vec<u8>)> {
        match self.last_request.lock() {
            Ok(last) => last.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl CompletionSender for StaticCompletionSender {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some((url.to_string(), body));
        }
        self.status.clone()
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::debug;

use crate::infra::service_traits::CommandQueue;
use crate::node_manager::OnboardingState;

/// Default capacity of the in-process command channel
pub const DEFAULT_COMMAND_CAPACITY: usize = 1024;

/// Lệnh gửi lên broker để cập nhật trạng thái node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeCommand {
    /// Đặt onboarding state cho node
    SetOnboardingState { node_id: String, state: OnboardingState },
    /// Ghi lại lý do test thất bại
    SetFailureReason { node_id: String, reason: String },
}

impl NodeCommand {
    pub fn set_onboarding_state(node_id: &str, state: OnboardingState) -> Self {
        NodeCommand::SetOnboardingState {
            node_id: node_id.to_string(),
            state,
        }
    }

    pub fn set_failure_reason(node_id: &str, reason: &str) -> Self {
        NodeCommand::SetFailureReason {
            node_id: node_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn node_id(&self) -> &str {
        match self {
            NodeCommand::SetOnboardingState { node_id, .. } => node_id,
            NodeCommand::SetFailureReason { node_id, .. } => node_id,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Command queue is full, dropped command for node {0}")]
    Full(String),

    #[error("Command queue is closed")]
    Closed,

    #[error("Command rejected: {0}")]
    Rejected(String),
}

/// CommandQueue implementation trên tokio mpsc (non-blocking, try_send)
#[derive(Clone)]
pub struct ChannelCommandQueue {
    sender: mpsc::Sender<NodeCommand>,
}

#[async_trait]
impl CommandQueue for ChannelCommandQueue {
    async fn submit(&self, command: NodeCommand) -> Result<(), QueueError> {
        debug!("[CommandBroker] Queue command for node {}", command.node_id());
        self.sender.try_send(command).map_err(|e| match e {
            TrySendError::Full(command) => QueueError::Full(command.node_id().to_string()),
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}

/// Receiving end held by whoever applies the commands
pub struct CommandReceiver {
    receiver: mpsc::Receiver<NodeCommand>,
}

impl CommandReceiver {
    /// Chờ command tiếp theo, None khi mọi sender đã bị drop
    pub async fn recv(&mut self) -> Option<NodeCommand> {
        self.receiver.recv().await
    }

    /// Lấy hết các command đang chờ mà không block
    pub fn drain(&mut self) -> Vec<NodeCommand> {
        let mut commands = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(command) => commands.push(command),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        commands
    }
}

pub struct CommandBroker;

impl CommandBroker {
    /// Tạo cặp queue/receiver với capacity cho trước (tối thiểu 1)
    pub fn channel(capacity: usize) -> (ChannelCommandQueue, CommandReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (ChannelCommandQueue { sender }, CommandReceiver { receiver })
    }
}

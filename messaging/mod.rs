//! Messaging: command broker giữa admission runner và node state store.
//!
//! Runner chỉ tạo command; thứ tự và đảm bảo delivery là trách nhiệm của broker.

pub mod broker;

pub use self::broker::{ChannelCommandQueue, CommandBroker, CommandReceiver, NodeCommand, QueueError};

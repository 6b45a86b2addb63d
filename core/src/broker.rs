//! Broker producer seam.
//!
//! The platform publishes through [`MessageProducer`] and never talks to a
//! broker client directly; the `orderflow-kafka` crate provides the
//! production implementation, `orderflow-testing` an in-memory one. The
//! producer handle is shared read-mostly across all partition loops and the
//! reliability pipeline's republish path, so implementations must support
//! concurrent use.

use crate::message::Headers;
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by broker operations.
#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    /// Failed to connect to the broker.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a message to a topic.
    #[error("publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed.
        topic: String,
        /// The reason for failure.
        reason: String,
    },

    /// Failed to subscribe to topics.
    #[error("subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe.
        topics: Vec<String>,
        /// The reason for failure.
        reason: String,
    },

    /// Network or transport error.
    #[error("transport error: {0}")]
    TransportError(String),
}

/// Partition and offset assigned to a published message.
pub type Placement = (i32, i64);

/// A shared, concurrency-safe producer of byte messages.
///
/// Publishing is at-least-once: a send that times out may still have been
/// written, and consumers must tolerate the duplicate.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Publish `value` to `topic` with partition affinity `key` and the
    /// given headers. Returns the broker-assigned partition and offset.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::PublishFailed`] if the broker rejects or
    /// times out the send.
    async fn send(
        &self,
        topic: &str,
        key: &[u8],
        value: &[u8],
        headers: &Headers,
    ) -> Result<Placement, BrokerError>;
}

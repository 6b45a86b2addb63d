//! Per-partition consumer loops.
//!
//! One [`ConsumerRuntime::run_partition`] call services one claimed
//! partition: messages are processed strictly in arrival order, one at a
//! time, and the offset is committed after the handler finishes whether it
//! succeeded or was escalated through the failure pipeline. Concurrency
//! exists across partitions only; the broker binding spawns one loop per
//! claim.
//!
//! Shutdown is cooperative: cancelling the runtime's token stops the loop
//! from picking up new messages but lets the in-flight one complete and
//! commit.

use crate::pipeline::FailurePipeline;
use crate::registry::HandlerRegistry;
use async_trait::async_trait;
use orderflow_core::message::Message;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// An ordered feed of messages for one claimed partition.
///
/// Returning `None` means the claim was revoked (rebalance) or the feed
/// closed; the loop exits without error. No in-flight state survives a
/// revocation, so handlers must tolerate re-invocation for the same
/// message.
#[async_trait]
pub trait PartitionSource: Send {
    /// Next message in offset order, or `None` when the claim ends.
    async fn next(&mut self) -> Option<Message>;
}

/// Commits consumed offsets back to the broker.
#[async_trait]
pub trait OffsetCommitter: Send + Sync {
    /// Mark `offset` on (`topic`, `partition`) as consumed.
    ///
    /// # Errors
    ///
    /// Commit failures mean the message may be redelivered; the runtime
    /// logs them and keeps going.
    async fn commit(&self, topic: &str, partition: i32, offset: i64) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: OffsetCommitter + ?Sized> OffsetCommitter for Arc<T> {
    async fn commit(&self, topic: &str, partition: i32, offset: i64) -> anyhow::Result<()> {
        (**self).commit(topic, partition, offset).await
    }
}

/// A [`PartitionSource`] backed by an mpsc channel.
///
/// Broker bindings route each claimed partition's messages into one of
/// these, preserving arrival order; the in-memory test broker uses the
/// same type directly.
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl ChannelSource {
    /// Create a source and its feeding half.
    #[must_use]
    pub fn new() -> (mpsc::UnboundedSender<Message>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl PartitionSource for ChannelSource {
    async fn next(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

/// Dispatches partition feeds to registered handlers.
///
/// Cloneable via `Arc`; one instance is shared by every partition loop of
/// a consumer group.
pub struct ConsumerRuntime {
    registry: Arc<HandlerRegistry>,
    pipeline: Arc<FailurePipeline>,
    shutdown: CancellationToken,
}

impl ConsumerRuntime {
    /// Create a runtime over a registry and failure pipeline.
    #[must_use]
    pub fn new(
        registry: Arc<HandlerRegistry>,
        pipeline: Arc<FailurePipeline>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            pipeline,
            shutdown,
        }
    }

    /// The registry this runtime dispatches against.
    #[must_use]
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Token that stops all partition loops when cancelled.
    #[must_use]
    pub const fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Service one partition until its feed ends or shutdown is requested.
    ///
    /// Messages are handled strictly sequentially; the offset for a
    /// message is committed only after its handler (and any failure
    /// escalation) has completed. Cancellation is observed between
    /// messages, never mid-message.
    pub async fn run_partition<S, C>(&self, mut source: S, committer: C)
    where
        S: PartitionSource,
        C: OffsetCommitter,
    {
        loop {
            let message = tokio::select! {
                () = self.shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, releasing partition loop");
                    break;
                }
                next = source.next() => match next {
                    Some(message) => message,
                    None => {
                        tracing::debug!("Partition feed closed, exiting loop");
                        break;
                    }
                },
            };

            self.process(&message).await;

            if let Err(e) = committer
                .commit(&message.topic, message.partition, message.offset)
                .await
            {
                tracing::warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Failed to commit offset (message may be redelivered)"
                );
            }
        }
    }

    async fn process(&self, message: &Message) {
        let Some(handler) = self.registry.handler_for(&message.topic) else {
            tracing::warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "No handler registered for topic, skipping message"
            );
            return;
        };

        tracing::debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            attempt = message.attempt(),
            "Dispatching message"
        );

        if let Err(error) = handler.handle(message).await {
            self.pipeline.handle_failure(message, &error).await;
        }
    }
}

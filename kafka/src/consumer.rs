//! Kafka consumer group binding for the partition runtime.
//!
//! One [`KafkaConsumerGroup`] joins a consumer group, claims partitions,
//! and feeds each claimed (topic, partition) pair into its own
//! [`ChannelSource`] worker running
//! [`ConsumerRuntime::run_partition`]. The single feed task preserves the
//! broker's per-partition arrival order; workers give the runtime its
//! concurrency across partitions.
//!
//! Offsets are stored with `enable.auto.commit` off and committed by the
//! worker only after its handler (or the failure pipeline) has finished
//! with the message, which is what makes delivery at-least-once.

use async_trait::async_trait;
use futures::StreamExt;
use orderflow_core::broker::BrokerError;
use orderflow_core::config::BrokerConfig;
use orderflow_core::message::{Headers, Message};
use orderflow_runtime::consumer::{ChannelSource, OffsetCommitter};
use orderflow_runtime::ConsumerRuntime;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers as _, Message as _};
use rdkafka::topic_partition_list::{Offset, TopicPartitionList};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A consumer group member driving the partition runtime.
///
/// # Example
///
/// ```no_run
/// use orderflow_kafka::KafkaConsumerGroup;
/// use orderflow_runtime::ConsumerRuntime;
/// use std::sync::Arc;
///
/// # async fn example(runtime: Arc<ConsumerRuntime>) -> Result<(), orderflow_core::BrokerError> {
/// let group = KafkaConsumerGroup::builder()
///     .brokers("localhost:9092")
///     .group_id("order-workers")
///     .runtime(runtime)
///     .build()?;
///
/// group.run().await;
/// # Ok(())
/// # }
/// ```
pub struct KafkaConsumerGroup {
    consumer: StreamConsumer,
    runtime: Arc<ConsumerRuntime>,
}

impl KafkaConsumerGroup {
    /// Create a builder for configuring the consumer group.
    #[must_use]
    pub fn builder() -> KafkaConsumerGroupBuilder {
        KafkaConsumerGroupBuilder::default()
    }

    /// Create a consumer group from a [`BrokerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::SubscriptionFailed`] if the client cannot be
    /// created or the subscription is rejected.
    pub fn from_config(
        config: &BrokerConfig,
        runtime: Arc<ConsumerRuntime>,
    ) -> Result<Self, BrokerError> {
        Self::builder()
            .brokers(&config.brokers)
            .group_id(&config.consumer.group_id)
            .session_timeout_ms(config.consumer.session_timeout_ms)
            .auto_offset_reset(&config.consumer.auto_offset_reset)
            .runtime(runtime)
            .build()
    }

    /// Consume until the runtime's shutdown token is cancelled or the
    /// broker stream ends.
    ///
    /// On shutdown the feed stops first, then every partition worker
    /// drains its channel, finishes its in-flight message and commits
    /// before the call returns.
    pub async fn run(self) {
        let consumer = Arc::new(self.consumer);
        let committer = GroupCommitter {
            consumer: Arc::clone(&consumer),
        };
        let shutdown = self.runtime.shutdown_token().clone();

        let mut feeds: HashMap<(String, i32), mpsc::UnboundedSender<Message>> = HashMap::new();
        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        let mut stream = consumer.stream();

        loop {
            let borrowed = tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, stopping consumer feed");
                    break;
                }
                next = stream.next() => match next {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Failed to receive message");
                        continue;
                    }
                    None => {
                        tracing::debug!("Consumer stream ended");
                        break;
                    }
                },
            };

            let message = convert(&borrowed);
            let claim = (message.topic.clone(), message.partition);
            let sender = feeds.entry(claim).or_insert_with(|| {
                let (tx, source) = ChannelSource::new();
                let runtime = Arc::clone(&self.runtime);
                let committer = committer.clone();
                tracing::debug!(
                    topic = %message.topic,
                    partition = message.partition,
                    "Starting partition worker"
                );
                workers.push(tokio::spawn(async move {
                    runtime.run_partition(source, committer).await;
                }));
                tx
            });

            if sender.send(message).is_err() {
                tracing::debug!("Partition worker gone, dropping message for redelivery");
            }
        }

        drop(stream);
        // Closing the feeds lets each worker drain and exit.
        feeds.clear();
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "Partition worker ended abnormally");
            }
        }
        tracing::info!("Consumer group stopped");
    }
}

/// Builder for a [`KafkaConsumerGroup`].
#[derive(Default)]
pub struct KafkaConsumerGroupBuilder {
    brokers: Option<String>,
    group_id: Option<String>,
    session_timeout_ms: Option<u64>,
    auto_offset_reset: Option<String>,
    runtime: Option<Arc<ConsumerRuntime>>,
}

impl KafkaConsumerGroupBuilder {
    /// Comma-separated broker addresses.
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Consumer group id shared by all members splitting the workload.
    #[must_use]
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Session timeout before the broker evicts a silent member.
    /// Default: 6000 ms.
    #[must_use]
    pub const fn session_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.session_timeout_ms = Some(timeout_ms);
        self
    }

    /// Where a new group starts reading: "earliest", "latest".
    /// Default: "latest".
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// The runtime whose registry decides the subscribed topics and whose
    /// handlers process the messages.
    #[must_use]
    pub fn runtime(mut self, runtime: Arc<ConsumerRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the group and subscribe to every registered topic (base and
    /// retry; DLQ topics are terminal and never subscribed).
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::SubscriptionFailed`] if required fields are
    /// missing, the client cannot be created, or the subscription is
    /// rejected.
    pub fn build(self) -> Result<KafkaConsumerGroup, BrokerError> {
        let runtime = self.runtime.ok_or_else(|| BrokerError::SubscriptionFailed {
            topics: vec![],
            reason: "Runtime not configured".to_string(),
        })?;
        let topics: Vec<String> = runtime.registry().topics().to_vec();
        let brokers = self.brokers.ok_or_else(|| BrokerError::SubscriptionFailed {
            topics: topics.clone(),
            reason: "Brokers not configured".to_string(),
        })?;
        let group_id = self.group_id.ok_or_else(|| BrokerError::SubscriptionFailed {
            topics: topics.clone(),
            reason: "Consumer group id not configured".to_string(),
        })?;

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &group_id)
            .set("enable.auto.commit", "false")
            .set(
                "auto.offset.reset",
                self.auto_offset_reset.as_deref().unwrap_or("latest"),
            )
            .set(
                "session.timeout.ms",
                self.session_timeout_ms.unwrap_or(6000).to_string(),
            )
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| BrokerError::SubscriptionFailed {
                topics: topics.clone(),
                reason: format!("Failed to create consumer: {e}"),
            })?;

        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|e| BrokerError::SubscriptionFailed {
                topics: topics.clone(),
                reason: format!("Failed to subscribe: {e}"),
            })?;

        tracing::info!(
            topics = ?topics,
            group_id = %group_id,
            brokers = %brokers,
            manual_commit = true,
            "Joined consumer group"
        );

        Ok(KafkaConsumerGroup { consumer, runtime })
    }
}

/// Commits offsets through the shared group consumer.
#[derive(Clone)]
struct GroupCommitter {
    consumer: Arc<StreamConsumer>,
}

#[async_trait]
impl OffsetCommitter for GroupCommitter {
    async fn commit(&self, topic: &str, partition: i32, offset: i64) -> anyhow::Result<()> {
        let mut list = TopicPartitionList::new();
        // Kafka commits point at the next offset to read.
        list.add_partition_offset(topic, partition, Offset::Offset(offset + 1))?;
        self.consumer.commit(&list, CommitMode::Async)?;
        Ok(())
    }
}

fn convert(borrowed: &BorrowedMessage<'_>) -> Message {
    let headers = borrowed
        .headers()
        .map(|raw| {
            raw.iter()
                .map(|h| {
                    (
                        h.key.to_string(),
                        h.value.map(<[u8]>::to_vec).unwrap_or_default(),
                    )
                })
                .collect()
        })
        .unwrap_or_else(Headers::new);

    let timestamp = borrowed
        .timestamp()
        .to_millis()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .unwrap_or_else(chrono::Utc::now);

    Message {
        topic: borrowed.topic().to_string(),
        partition: borrowed.partition(),
        offset: borrowed.offset(),
        key: borrowed.key().map(<[u8]>::to_vec).unwrap_or_default(),
        value: borrowed.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        headers,
        timestamp,
    }
}

//! In-memory partitioned broker.

use async_trait::async_trait;
use orderflow_core::broker::{BrokerError, Placement};
use orderflow_core::message::{Headers, Message};
use orderflow_core::MessageProducer;
use orderflow_runtime::consumer::{ChannelSource, OffsetCommitter};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;
use tokio::sync::mpsc;

struct Partition {
    messages: Vec<Message>,
    subscriber: Option<mpsc::UnboundedSender<Message>>,
}

struct Topic {
    partitions: Vec<Partition>,
}

/// A partitioned, append-only topic log.
///
/// Messages with the same key always land on the same partition
/// (hash-based affinity, like the real broker), offsets are monotonic per
/// partition, and a subscribed [`ChannelSource`] receives every message in
/// append order — including a replay of messages published before the
/// subscription.
pub struct InMemoryBroker {
    partitions_per_topic: i32,
    topics: Mutex<HashMap<String, Topic>>,
    fail_publishes: Mutex<bool>,
}

impl InMemoryBroker {
    /// Create a broker where every topic has `partitions_per_topic`
    /// partitions.
    #[must_use]
    pub fn new(partitions_per_topic: i32) -> Self {
        Self {
            partitions_per_topic: partitions_per_topic.max(1),
            topics: Mutex::new(HashMap::new()),
            fail_publishes: Mutex::new(false),
        }
    }

    /// Make subsequent publishes fail with a transport error.
    pub fn fail_publishes(&self, fail: bool) {
        *self
            .fail_publishes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = fail;
    }

    fn partition_for(&self, key: &[u8]) -> i32 {
        if key.is_empty() {
            return 0;
        }
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let partition = (hasher.finish() % self.partitions_per_topic as u64) as i32;
        partition
    }

    /// Subscribe to one partition of a topic, replaying history first.
    ///
    /// Only one subscriber per partition; a later call replaces the
    /// earlier feed (mirroring a rebalance moving the claim).
    pub fn subscribe(&self, topic: &str, partition: i32) -> ChannelSource {
        let (tx, source) = ChannelSource::new();
        let mut topics = self
            .topics
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let topic = topics.entry(topic.to_string()).or_insert_with(|| Topic {
            partitions: (0..self.partitions_per_topic)
                .map(|_| Partition {
                    messages: Vec::new(),
                    subscriber: None,
                })
                .collect(),
        });
        if let Some(part) = topic.partitions.get_mut(partition.unsigned_abs() as usize) {
            for message in &part.messages {
                let _ = tx.send(message.clone());
            }
            part.subscriber = Some(tx);
        }
        source
    }

    /// All messages published to `topic`, across partitions, in publish
    /// order per partition.
    #[must_use]
    pub fn published(&self, topic: &str) -> Vec<Message> {
        let topics = self
            .topics
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        topics
            .get(topic)
            .map(|t| {
                t.partitions
                    .iter()
                    .flat_map(|p| p.messages.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of messages published to `topic`.
    #[must_use]
    pub fn published_count(&self, topic: &str) -> usize {
        self.published(topic).len()
    }

    /// Number of partitions per topic.
    #[must_use]
    pub const fn partitions(&self) -> i32 {
        self.partitions_per_topic
    }
}

#[async_trait]
impl MessageProducer for InMemoryBroker {
    async fn send(
        &self,
        topic: &str,
        key: &[u8],
        value: &[u8],
        headers: &Headers,
    ) -> Result<Placement, BrokerError> {
        if *self
            .fail_publishes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
        {
            return Err(BrokerError::PublishFailed {
                topic: topic.to_string(),
                reason: "injected publish failure".to_string(),
            });
        }

        let partition = self.partition_for(key);
        let mut topics = self
            .topics
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let topic_state = topics.entry(topic.to_string()).or_insert_with(|| Topic {
            partitions: (0..self.partitions_per_topic)
                .map(|_| Partition {
                    messages: Vec::new(),
                    subscriber: None,
                })
                .collect(),
        });

        let Some(part) = topic_state.partitions.get_mut(partition.unsigned_abs() as usize) else {
            return Err(BrokerError::TransportError(format!(
                "no partition {partition} for topic {topic}"
            )));
        };

        #[allow(clippy::cast_possible_wrap)]
        let offset = part.messages.len() as i64;
        let message = Message {
            topic: topic.to_string(),
            partition,
            offset,
            key: key.to_vec(),
            value: value.to_vec(),
            headers: headers.clone(),
            timestamp: chrono::Utc::now(),
        };

        part.messages.push(message.clone());
        if let Some(subscriber) = &part.subscriber {
            // A closed feed just means the loop shut down; history stays.
            let _ = subscriber.send(message);
        }

        Ok((partition, offset))
    }
}

/// Captures offset commits for assertions.
#[derive(Default)]
pub struct RecordingCommitter {
    committed: Mutex<HashMap<(String, i32), i64>>,
}

impl RecordingCommitter {
    /// Create an empty committer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last committed offset for a topic partition.
    #[must_use]
    pub fn committed(&self, topic: &str, partition: i32) -> Option<i64> {
        self.committed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(topic.to_string(), partition))
            .copied()
    }
}

#[async_trait]
impl OffsetCommitter for RecordingCommitter {
    async fn commit(&self, topic: &str, partition: i32, offset: i64) -> anyhow::Result<()> {
        self.committed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((topic.to_string(), partition), offset);
        Ok(())
    }
}

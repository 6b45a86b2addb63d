//! Kafka producer implementing [`MessageProducer`].

use async_trait::async_trait;
use orderflow_core::broker::{BrokerError, Placement};
use orderflow_core::config::BrokerConfig;
use orderflow_core::message::Headers;
use orderflow_core::MessageProducer;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;

/// Kafka producer for publishing order events and retry/DLQ republishes.
///
/// Keys drive partition affinity: every message for one order carries the
/// order id as its key, so the broker keeps its events on one partition.
///
/// # Example
///
/// ```no_run
/// use orderflow_kafka::KafkaProducer;
///
/// # fn example() -> Result<(), orderflow_core::BrokerError> {
/// let producer = KafkaProducer::builder()
///     .brokers("localhost:9092")
///     .acks("all")
///     .compression("lz4")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct KafkaProducer {
    producer: FutureProducer,
    timeout: Duration,
}

impl KafkaProducer {
    /// Create a producer with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConnectionFailed`] if the client cannot be
    /// created from the configuration.
    pub fn new(brokers: &str) -> Result<Self, BrokerError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a producer from a [`BrokerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConnectionFailed`] if the client cannot be
    /// created from the configuration.
    pub fn from_config(config: &BrokerConfig) -> Result<Self, BrokerError> {
        Self::builder()
            .brokers(&config.brokers)
            .acks(&config.producer.required_acks)
            .compression(&config.producer.compression)
            .timeout(Duration::from_millis(config.producer.timeout_ms))
            .build()
    }

    /// Create a builder for configuring the producer.
    #[must_use]
    pub fn builder() -> KafkaProducerBuilder {
        KafkaProducerBuilder::default()
    }
}

/// Builder for a [`KafkaProducer`].
#[derive(Default)]
pub struct KafkaProducerBuilder {
    brokers: Option<String>,
    acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
}

impl KafkaProducerBuilder {
    /// Comma-separated broker addresses (e.g. "localhost:9092").
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Acknowledgment mode: "0", "1" or "all". Default: "all".
    #[must_use]
    pub fn acks(mut self, acks: impl Into<String>) -> Self {
        self.acks = Some(acks.into());
        self
    }

    /// Compression codec: "none", "gzip", "snappy", "lz4", "zstd".
    /// Default: "none".
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Send timeout. Default: 5 seconds.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the [`KafkaProducer`].
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConnectionFailed`] if brokers are not set or
    /// the underlying client rejects the configuration.
    pub fn build(self) -> Result<KafkaProducer, BrokerError> {
        let brokers = self
            .brokers
            .ok_or_else(|| BrokerError::ConnectionFailed("Brokers not configured".to_string()))?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));

        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", self.acks.as_deref().unwrap_or("all"))
            .set(
                "compression.type",
                self.compression.as_deref().unwrap_or("none"),
            );

        let producer: FutureProducer = config.create().map_err(|e| {
            BrokerError::ConnectionFailed(format!("Failed to create producer: {e}"))
        })?;

        tracing::info!(
            brokers = %brokers,
            acks = self.acks.as_deref().unwrap_or("all"),
            compression = self.compression.as_deref().unwrap_or("none"),
            "KafkaProducer created"
        );

        Ok(KafkaProducer { producer, timeout })
    }
}

#[async_trait]
impl MessageProducer for KafkaProducer {
    async fn send(
        &self,
        topic: &str,
        key: &[u8],
        value: &[u8],
        headers: &Headers,
    ) -> Result<Placement, BrokerError> {
        let mut owned = OwnedHeaders::new_with_capacity(headers.len());
        for (header_key, header_value) in headers.iter() {
            owned = owned.insert(Header {
                key: header_key,
                value: Some(header_value),
            });
        }

        let record = FutureRecord::to(topic)
            .payload(value)
            .key(key)
            .headers(owned);

        match self
            .producer
            .send(record, Timeout::After(self.timeout))
            .await
        {
            Ok((partition, offset)) => {
                tracing::debug!(
                    topic = %topic,
                    partition,
                    offset,
                    "Message published"
                );
                Ok((partition, offset))
            }
            Err((kafka_error, _)) => {
                tracing::error!(
                    topic = %topic,
                    error = %kafka_error,
                    "Failed to publish message"
                );
                Err(BrokerError::PublishFailed {
                    topic: topic.to_string(),
                    reason: kafka_error.to_string(),
                })
            }
        }
    }
}

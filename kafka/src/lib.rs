//! # Orderflow Kafka
//!
//! Kafka binding for the Orderflow platform, built on rdkafka:
//!
//! - [`KafkaProducer`]: publishes events and the retry/DLQ republishes of
//!   the failure pipeline, implementing
//!   [`orderflow_core::MessageProducer`]
//! - [`KafkaConsumerGroup`]: joins a consumer group and drives one
//!   [`orderflow_runtime::ConsumerRuntime`] partition loop per claimed
//!   (topic, partition) pair
//!
//! # Delivery Semantics
//!
//! **At-least-once** with manual offset commits:
//! - Auto-commit is disabled; a partition worker commits an offset only
//!   after its handler finished with the message, whether it succeeded or
//!   was escalated to the retry/DLQ pipeline
//! - A crash before commit redelivers the message, so handlers must be
//!   idempotent
//! - Ordering is guaranteed within a partition; events keyed by order id
//!   share a partition and therefore stay ordered per order
//!
//! # Example
//!
//! ```no_run
//! use orderflow_kafka::{KafkaConsumerGroup, KafkaProducer};
//! use orderflow_runtime::ConsumerRuntime;
//! use std::sync::Arc;
//!
//! # async fn example(runtime: Arc<ConsumerRuntime>) -> Result<(), orderflow_core::BrokerError> {
//! let producer = KafkaProducer::builder()
//!     .brokers("localhost:9092")
//!     .acks("all")
//!     .build()?;
//!
//! let group = KafkaConsumerGroup::builder()
//!     .brokers("localhost:9092")
//!     .group_id("order-workers")
//!     .auto_offset_reset("earliest")
//!     .runtime(runtime)
//!     .build()?;
//!
//! group.run().await;
//! # Ok(())
//! # }
//! ```

pub mod consumer;
pub mod producer;

pub use consumer::{KafkaConsumerGroup, KafkaConsumerGroupBuilder};
pub use producer::{KafkaProducer, KafkaProducerBuilder};

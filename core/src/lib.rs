//! # Orderflow Core
//!
//! Core types and traits for the Orderflow event-processing platform.
//!
//! This crate defines the vocabulary shared by every other crate in the
//! workspace:
//!
//! - [`message::Message`]: the immutable unit of transport, including the
//!   ordered header list and the `x-attempt` retry counter
//! - [`broker::MessageProducer`]: the seam between the platform and a
//!   concrete broker client (Kafka in production, in-memory in tests)
//! - [`handler::MessageHandler`]: the per-topic processing contract fed by
//!   the consumer runtime
//! - [`retry::RetryPolicy`] and [`retry::TopicRoutes`]: per-topic retry
//!   configuration and the derived `.retry` / `.dlq` topic naming
//!
//! # Delivery Semantics
//!
//! The platform is at-least-once end to end: offsets are committed after a
//! handler finishes (success or failure escalation), so a crash in between
//! causes redelivery. Handlers must be idempotent.
//!
//! # Example
//!
//! ```
//! use orderflow_core::message::{Headers, Message};
//! use orderflow_core::retry::{RetryPolicy, TopicRoutes};
//! use std::time::Duration;
//!
//! let routes = TopicRoutes::builder()
//!     .policy("order.events", RetryPolicy::new(3, Duration::from_secs(1)))
//!     .build();
//!
//! assert_eq!(routes.retry_topic("order.events"), "order.events.retry");
//! assert_eq!(routes.dlq_topic("order.events.retry"), "order.events.dlq");
//!
//! let msg = Message::new("order.events", b"k".to_vec(), b"{}".to_vec());
//! assert_eq!(msg.attempt(), 0);
//! ```

pub mod broker;
pub mod config;
pub mod handler;
pub mod message;
pub mod retry;

pub use broker::{BrokerError, MessageProducer};
pub use handler::{MessageHandler, decode_json, json_handler};
pub use message::{ATTEMPT_HEADER, Headers, Message};
pub use retry::{RetryPolicy, TopicRoutes};

//! # Orderflow Testing
//!
//! In-memory fakes for exercising the platform without a broker or store:
//!
//! - [`broker::InMemoryBroker`]: a partitioned topic log implementing
//!   [`orderflow_core::MessageProducer`], with per-partition subscription
//!   feeds and published-message inspection
//! - [`broker::RecordingCommitter`]: captures offset commits
//! - [`repository::InMemoryOrderRepository`]: order store with failure
//!   injection
//! - [`activities::RecordingActivities`]: scripted workflow activities
//!   that log every invocation
//!
//! These fakes are deliberately synchronous inside (std mutexes, no
//! background tasks) so tests stay deterministic.

pub mod activities;
pub mod broker;
pub mod repository;

pub use activities::RecordingActivities;
pub use broker::{InMemoryBroker, RecordingCommitter};
pub use repository::InMemoryOrderRepository;

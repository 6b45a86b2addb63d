//! # Orderflow Runtime
//!
//! Broker-agnostic reliable event processing: the handler registry, the
//! per-partition consumer runtime, and the failure pipeline that routes
//! handler errors to retry and dead-letter topics.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   per partition   ┌──────────────────┐
//! │ PartitionSource  │ ────────────────▶ │ ConsumerRuntime   │
//! │ (broker feed)    │   strict order    │  dispatch + commit│
//! └──────────────────┘                   └────────┬─────────┘
//!                                                 │ handler error
//!                                                 ▼
//!                                        ┌──────────────────┐
//!                                        │ FailurePipeline  │
//!                                        │ attempt++, sleep │
//!                                        │ retry / DLQ pub  │
//!                                        └──────────────────┘
//! ```
//!
//! The runtime never withholds an offset commit to force redelivery:
//! redelivery happens only through explicit retry-topic republish, so the
//! source partition always advances.

pub mod consumer;
pub mod pipeline;
pub mod registry;

pub use consumer::{ChannelSource, ConsumerRuntime, OffsetCommitter, PartitionSource};
pub use pipeline::FailurePipeline;
pub use registry::{HandlerRegistry, HandlerRegistryBuilder};

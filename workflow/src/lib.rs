//! # Orderflow Workflow
//!
//! The durable, signal-driven order workflow engine and its surroundings:
//!
//! - [`engine::WorkflowEngine`]: one serialized execution context per
//!   order, racing named signals against a dispatch timer
//! - [`activities`]: the idempotent side-effecting steps each transition
//!   runs (status update, payment charge), retried with exponential
//!   backoff
//! - [`bridge`]: event consumers translating broker messages into engine
//!   starts and signals
//!
//! # Example
//!
//! ```no_run
//! use orderflow_workflow::engine::{StartOptions, WorkflowEngine, WorkflowConfig};
//! use orderflow_workflow::signal::Signal;
//!
//! # async fn example(activities: std::sync::Arc<dyn orderflow_workflow::activities::Activities>) -> anyhow::Result<()> {
//! let engine = WorkflowEngine::new(activities, WorkflowConfig::default());
//!
//! engine.start(StartOptions {
//!     workflow_id: "order_01".to_string(),
//!     order_id: "01".to_string(),
//! }).await?;
//!
//! engine.signal("order_01", Signal::Dispatched).await?;
//! engine.signal("order_01", Signal::Delivered).await?;
//! # Ok(())
//! # }
//! ```

pub mod activities;
pub mod bridge;
pub mod engine;
pub mod retry;
pub mod signal;

pub use activities::{Activities, ActivityError, OrderActivities, PaymentGateway, PaymentMethod};
pub use bridge::{DispatchEventConsumer, OrderCdcConsumer, ShipmentEventConsumer};
pub use engine::{StartOptions, StartOutcome, WorkflowConfig, WorkflowEngine, WorkflowError};
pub use retry::{ActivityRetryPolicy, execute_with_retry};
pub use signal::Signal;

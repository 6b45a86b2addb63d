//! The signal bridge: event consumers translating broker messages into
//! engine calls.
//!
//! All three consumers are thin adapters over the typed-handler contract:
//! unmarshal the payload, resolve the target workflow, forward. No state
//! machine logic lives here.
//!
//! Unparseable payloads are dropped (poison input never succeeds);
//! repository and engine lookup failures propagate as handler errors so
//! the reliability pipeline retries them — the order row or workflow start
//! may simply not have landed yet.

use crate::engine::{StartOptions, WorkflowEngine};
use crate::signal::Signal;
use anyhow::Context;
use async_trait::async_trait;
use orderflow_core::handler::decode_json;
use orderflow_core::message::Message;
use orderflow_core::MessageHandler;
use orderflow_order::OrderRepository;
use serde::Deserialize;
use std::sync::Arc;

/// Dispatch events published when a driver accepts an order.
#[derive(Debug, Deserialize)]
struct DispatchEvent {
    order_id: String,
    #[serde(default)]
    dispatch_status: String,
}

/// Consumer for dispatch events: resolves the order and signals
/// `order-dispatched`.
pub struct DispatchEventConsumer {
    engine: WorkflowEngine,
    repository: Arc<dyn OrderRepository>,
}

impl DispatchEventConsumer {
    /// Create the consumer.
    #[must_use]
    pub fn new(engine: WorkflowEngine, repository: Arc<dyn OrderRepository>) -> Self {
        Self { engine, repository }
    }
}

#[async_trait]
impl MessageHandler for DispatchEventConsumer {
    async fn handle(&self, message: &Message) -> anyhow::Result<()> {
        let Some(event) = decode_json::<DispatchEvent>(message) else {
            return Ok(());
        };

        tracing::info!(
            order_id = %event.order_id,
            dispatch_status = %event.dispatch_status,
            "Processing dispatch event"
        );

        let order = self
            .repository
            .get_by_id(&event.order_id)
            .await
            .context("resolving order for dispatch event")?;

        self.engine
            .signal(&order.workflow_id, Signal::Dispatched)
            .await
            .context("signalling workflow for dispatch event")?;
        Ok(())
    }
}

/// Shipment status events.
#[derive(Debug, Deserialize)]
struct ShipmentEvent {
    order_id: String,
    status: String,
}

/// Consumer for shipment events: maps the status string to a signal.
///
/// `DELIVERED` ⇒ `order-delivered`, `CANCELED` ⇒ `order-canceled`;
/// anything else is logged and dropped.
pub struct ShipmentEventConsumer {
    engine: WorkflowEngine,
    repository: Arc<dyn OrderRepository>,
}

impl ShipmentEventConsumer {
    /// Create the consumer.
    #[must_use]
    pub fn new(engine: WorkflowEngine, repository: Arc<dyn OrderRepository>) -> Self {
        Self { engine, repository }
    }
}

#[async_trait]
impl MessageHandler for ShipmentEventConsumer {
    async fn handle(&self, message: &Message) -> anyhow::Result<()> {
        let Some(event) = decode_json::<ShipmentEvent>(message) else {
            return Ok(());
        };

        let signal = match event.status.as_str() {
            "DELIVERED" => Signal::Delivered,
            "CANCELED" => Signal::Canceled,
            other => {
                tracing::warn!(
                    order_id = %event.order_id,
                    status = other,
                    "Unknown shipment status, dropping event"
                );
                return Ok(());
            }
        };

        tracing::info!(
            order_id = %event.order_id,
            status = %event.status,
            signal = %signal,
            "Processing shipment event"
        );

        let order = self
            .repository
            .get_by_id(&event.order_id)
            .await
            .context("resolving order for shipment event")?;

        self.engine
            .signal(&order.workflow_id, signal)
            .await
            .context("signalling workflow for shipment event")?;
        Ok(())
    }
}

/// Change-data-capture envelope on order-table events.
#[derive(Debug, Deserialize)]
struct OrderCdcEvent {
    #[serde(rename = "__op")]
    op: String,
    id: String,
    workflow_id: String,
}

impl OrderCdcEvent {
    fn is_created(&self) -> bool {
        self.op == "c"
    }
}

/// Consumer for order CDC records: a create operation starts the order's
/// workflow instance. Updates, deletes and snapshot reads are ignored.
pub struct OrderCdcConsumer {
    engine: WorkflowEngine,
}

impl OrderCdcConsumer {
    /// Create the consumer.
    #[must_use]
    pub const fn new(engine: WorkflowEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl MessageHandler for OrderCdcConsumer {
    async fn handle(&self, message: &Message) -> anyhow::Result<()> {
        let Some(event) = decode_json::<OrderCdcEvent>(message) else {
            return Ok(());
        };

        if !event.is_created() {
            tracing::debug!(op = %event.op, order_id = %event.id, "Ignoring non-create CDC record");
            return Ok(());
        }

        // At-least-once CDC delivery: duplicate creates hit the engine's
        // idempotent start and come back as no-ops.
        let outcome = self
            .engine
            .start(StartOptions {
                workflow_id: event.workflow_id.clone(),
                order_id: event.id.clone(),
            })
            .await
            .context("starting workflow from CDC record")?;

        tracing::info!(
            workflow_id = %event.workflow_id,
            order_id = %event.id,
            outcome = ?outcome,
            "Workflow start requested from CDC"
        );
        Ok(())
    }
}

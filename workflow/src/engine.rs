//! The order workflow engine.
//!
//! One instance per order: a tokio task that owns the order's lifecycle
//! state and a mailbox of inbound signals. All signals for a workflow id
//! flow through that single task, so no two transitions for the same order
//! are ever evaluated concurrently.
//!
//! # Lifecycle
//!
//! ```text
//! start ──▶ charge payment ──▶ AWAITING_DISPATCH ──▶ IN_TRANSIT ──▶ COMPLETED
//!             │ declined          │        │ timeout / canceled │ canceled
//!             ▼                   ▼        ▼                    ▼
//!          CANCELLED          dispatched  CANCELLED          CANCELLED
//! ```
//!
//! Each wait point races the named signals (plus, in `AWAITING_DISPATCH`,
//! one timer) and exactly one branch wins; signals outside the current
//! window are ignored, not queued across states. Exactly one activity runs
//! per transition, and the transition only commits if the activity
//! succeeds.

use crate::activities::{Activities, ActivityError};
use crate::retry::{ActivityRetryPolicy, execute_with_retry};
use crate::signal::Signal;
use orderflow_order::OrderStatus;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// How long `AWAITING_DISPATCH` waits before cancelling the order.
    pub dispatch_timeout: Duration,
    /// Retry policy applied around every activity execution.
    pub activity_retry: ActivityRetryPolicy,
    /// Routing key recorded for started instances.
    pub task_queue: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout: Duration::from_secs(60),
            activity_retry: ActivityRetryPolicy::default(),
            task_queue: "ORDER_TASK_QUEUE".to_string(),
        }
    }
}

/// Parameters for starting a workflow instance.
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// Workflow instance id (derived from the order id).
    pub workflow_id: String,
    /// The order this instance manages.
    pub order_id: String,
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new instance was spawned.
    Started,
    /// An instance with this id is already live; the start was a no-op.
    AlreadyRunning,
    /// The instance already ran to a terminal state; the start was a no-op.
    AlreadyCompleted,
}

/// Errors surfaced by the engine API.
#[derive(Error, Debug, Clone)]
pub enum WorkflowError {
    /// No live or completed instance for the id.
    #[error("no workflow instance: {0}")]
    NotFound(String),

    /// An activity kept failing past the engine retry budget.
    #[error("activity failed: {0}")]
    ActivityFailed(#[from] ActivityError),

    /// The instance mailbox closed while the instance was still waiting.
    #[error("workflow {0} abandoned: mailbox closed")]
    Abandoned(String),
}

enum WaitOutcome {
    Dispatched,
    Delivered,
    Canceled,
    TimedOut,
}

#[derive(Default)]
struct EngineState {
    running: HashMap<String, mpsc::UnboundedSender<Signal>>,
    completed: HashSet<String>,
}

struct Inner {
    activities: Arc<dyn Activities>,
    config: WorkflowConfig,
    state: Mutex<EngineState>,
}

/// Handle to the workflow engine; cheap to clone and share.
#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<Inner>,
}

impl WorkflowEngine {
    /// Create an engine over the given activity set.
    #[must_use]
    pub fn new(activities: Arc<dyn Activities>, config: WorkflowConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                activities,
                config,
                state: Mutex::new(EngineState::default()),
            }),
        }
    }

    /// Start a workflow instance.
    ///
    /// Starting twice with the same workflow id is idempotent: a live or
    /// completed instance absorbs the duplicate and reports which case
    /// applied.
    ///
    /// # Errors
    ///
    /// Currently infallible in practice; kept fallible for parity with
    /// remote engine implementations.
    pub async fn start(&self, options: StartOptions) -> Result<StartOutcome, WorkflowError> {
        let mut state = self.inner.state.lock().await;

        if state.completed.contains(&options.workflow_id) {
            tracing::debug!(
                workflow_id = %options.workflow_id,
                "Duplicate start for completed workflow, ignoring"
            );
            return Ok(StartOutcome::AlreadyCompleted);
        }
        if state.running.contains_key(&options.workflow_id) {
            tracing::debug!(
                workflow_id = %options.workflow_id,
                "Duplicate start for running workflow, ignoring"
            );
            return Ok(StartOutcome::AlreadyRunning);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.running.insert(options.workflow_id.clone(), tx);
        drop(state);

        tracing::info!(
            workflow_id = %options.workflow_id,
            order_id = %options.order_id,
            task_queue = %self.inner.config.task_queue,
            "Workflow started"
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            run_instance(inner, options, rx).await;
        });

        Ok(StartOutcome::Started)
    }

    /// Deliver a signal to a workflow instance.
    ///
    /// Signals to completed instances are silent no-ops (duplicate and
    /// late deliveries are expected under at-least-once transport).
    ///
    /// # Errors
    ///
    /// [`WorkflowError::NotFound`] when the id was never started; callers
    /// may retry, since the start event can still be in flight.
    pub async fn signal(&self, workflow_id: &str, signal: Signal) -> Result<(), WorkflowError> {
        let state = self.inner.state.lock().await;

        if let Some(tx) = state.running.get(workflow_id) {
            // A send failure means the instance just reached a terminal
            // state; treat it like the completed case below.
            if tx.send(signal).is_err() {
                tracing::debug!(workflow_id, signal = %signal, "Instance just finished, dropping signal");
            }
            return Ok(());
        }

        if state.completed.contains(workflow_id) {
            tracing::debug!(workflow_id, signal = %signal, "Workflow already terminal, dropping signal");
            return Ok(());
        }

        Err(WorkflowError::NotFound(workflow_id.to_string()))
    }

    /// Whether an instance is currently live.
    pub async fn is_running(&self, workflow_id: &str) -> bool {
        self.inner.state.lock().await.running.contains_key(workflow_id)
    }

    /// Whether an instance ran to a terminal state.
    pub async fn is_completed(&self, workflow_id: &str) -> bool {
        self.inner.state.lock().await.completed.contains(workflow_id)
    }

    /// Wait until the instance leaves the running map.
    ///
    /// Test and shutdown helper; polls the instance table.
    pub async fn wait_for_completion(&self, workflow_id: &str) {
        while self.is_running(workflow_id).await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

async fn run_instance(
    inner: Arc<Inner>,
    options: StartOptions,
    mut mailbox: mpsc::UnboundedReceiver<Signal>,
) {
    let result = drive(&inner, &options, &mut mailbox).await;

    let mut state = inner.state.lock().await;
    state.running.remove(&options.workflow_id);

    match result {
        Ok(()) => {
            // Terminal: absorb duplicate starts and late signals from now on.
            state.completed.insert(options.workflow_id.clone());
            tracing::info!(
                workflow_id = %options.workflow_id,
                order_id = %options.order_id,
                "Workflow completed"
            );
        }
        Err(e) => {
            // Not marked completed: a later start may pick the order back up.
            tracing::error!(
                workflow_id = %options.workflow_id,
                order_id = %options.order_id,
                error = %e,
                "Workflow failed"
            );
        }
    }
}

async fn drive(
    inner: &Inner,
    options: &StartOptions,
    mailbox: &mut mpsc::UnboundedReceiver<Signal>,
) -> Result<(), WorkflowError> {
    let order_id = options.order_id.as_str();

    // Precondition: charge payment before waiting for dispatch. A decline
    // cancels the order rather than leaving it dangling.
    let paid = execute_with_retry(&inner.config.activity_retry, || {
        inner.activities.charge(order_id)
    })
    .await?;

    if !paid {
        tracing::warn!(order_id, "Payment declined, cancelling order");
        cancel(inner, order_id).await?;
        return Ok(());
    }

    // AWAITING_DISPATCH: race dispatched / canceled / timeout.
    match await_dispatch(inner, options, mailbox).await? {
        WaitOutcome::Dispatched => {
            execute_with_retry(&inner.config.activity_retry, || {
                inner.activities.update_status(order_id, OrderStatus::Dispatched)
            })
            .await?;
            tracing::info!(order_id, "Order dispatched, in transit");
        }
        WaitOutcome::Canceled => {
            tracing::info!(order_id, "Order cancelled while awaiting dispatch");
            return cancel(inner, order_id).await;
        }
        WaitOutcome::TimedOut => {
            tracing::info!(
                order_id,
                timeout_secs = inner.config.dispatch_timeout.as_secs(),
                "No driver found before timeout, cancelling order"
            );
            return cancel(inner, order_id).await;
        }
        WaitOutcome::Delivered => unreachable_signal(options, "order-delivered")?,
    }

    // IN_TRANSIT: race delivered / canceled.
    match await_delivery(options, mailbox).await? {
        WaitOutcome::Delivered => {
            execute_with_retry(&inner.config.activity_retry, || {
                inner.activities.update_status(order_id, OrderStatus::Completed)
            })
            .await?;
            tracing::info!(order_id, "Order completed");
            Ok(())
        }
        WaitOutcome::Canceled => {
            tracing::info!(order_id, "Order cancelled in transit");
            cancel(inner, order_id).await
        }
        WaitOutcome::Dispatched | WaitOutcome::TimedOut => {
            unreachable_signal(options, "non-delivery outcome")
        }
    }
}

async fn cancel(inner: &Inner, order_id: &str) -> Result<(), WorkflowError> {
    execute_with_retry(&inner.config.activity_retry, || {
        inner.activities.update_status(order_id, OrderStatus::Cancelled)
    })
    .await?;
    Ok(())
}

/// Wait in `AWAITING_DISPATCH`: one timer plus the dispatch/cancel
/// signals. Out-of-window signals (`order-delivered`) are ignored while
/// the timer keeps running.
async fn await_dispatch(
    inner: &Inner,
    options: &StartOptions,
    mailbox: &mut mpsc::UnboundedReceiver<Signal>,
) -> Result<WaitOutcome, WorkflowError> {
    let timeout = tokio::time::sleep(inner.config.dispatch_timeout);
    tokio::pin!(timeout);

    loop {
        tokio::select! {
            () = &mut timeout => return Ok(WaitOutcome::TimedOut),
            signal = mailbox.recv() => match signal {
                Some(Signal::Dispatched) => return Ok(WaitOutcome::Dispatched),
                Some(Signal::Canceled) => return Ok(WaitOutcome::Canceled),
                Some(other) => {
                    tracing::debug!(signal = %other, "Signal outside current wait window, ignoring");
                }
                None => return Err(WorkflowError::Abandoned(options.workflow_id.clone())),
            },
        }
    }
}

/// Wait in `IN_TRANSIT`: delivery/cancel only, no timer. Duplicate
/// `order-dispatched` signals from at-least-once delivery land here and
/// are ignored.
async fn await_delivery(
    options: &StartOptions,
    mailbox: &mut mpsc::UnboundedReceiver<Signal>,
) -> Result<WaitOutcome, WorkflowError> {
    loop {
        match mailbox.recv().await {
            Some(Signal::Delivered) => return Ok(WaitOutcome::Delivered),
            Some(Signal::Canceled) => return Ok(WaitOutcome::Canceled),
            Some(other) => {
                tracing::debug!(signal = %other, "Signal outside current wait window, ignoring");
            }
            None => return Err(WorkflowError::Abandoned(options.workflow_id.clone())),
        }
    }
}

fn unreachable_signal(options: &StartOptions, what: &str) -> Result<(), WorkflowError> {
    // Wait helpers never produce these variants for their state.
    tracing::error!(
        workflow_id = %options.workflow_id,
        what,
        "Wait helper returned an impossible outcome"
    );
    Err(WorkflowError::Abandoned(options.workflow_id.clone()))
}

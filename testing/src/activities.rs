//! Scripted workflow activities for engine tests.

use async_trait::async_trait;
use orderflow_order::OrderStatus;
use orderflow_workflow::activities::{Activities, ActivityError};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// One recorded activity invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityCall {
    /// `update_status(order_id, status)` was invoked.
    UpdateStatus(String, OrderStatus),
    /// `charge(order_id)` was invoked.
    Charge(String),
}

/// Activities fake that logs every invocation.
///
/// Charge outcome and transient failures are scripted up front, so
/// tests can drive decline and retry paths without a gateway.
pub struct RecordingActivities {
    calls: Mutex<Vec<ActivityCall>>,
    charge_outcome: AtomicBool,
    failing_calls: AtomicUsize,
}

impl Default for RecordingActivities {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            charge_outcome: AtomicBool::new(true),
            failing_calls: AtomicUsize::new(0),
        }
    }
}

impl RecordingActivities {
    /// Create a recorder whose charges succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script whether charges go through.
    pub fn set_charge_outcome(&self, paid: bool) {
        self.charge_outcome.store(paid, Ordering::SeqCst);
    }

    /// Make the next `n` activity invocations fail transiently.
    pub fn fail_next_calls(&self, n: usize) {
        self.failing_calls.store(n, Ordering::SeqCst);
    }

    /// Every invocation so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ActivityCall> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Statuses written so far, in order.
    #[must_use]
    pub fn statuses_written(&self) -> Vec<OrderStatus> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ActivityCall::UpdateStatus(_, status) => Some(status),
                ActivityCall::Charge(_) => None,
            })
            .collect()
    }

    fn record(&self, call: ActivityCall) -> Result<(), ActivityError> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(call);
        if self
            .failing_calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ActivityError::Gateway("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Activities for RecordingActivities {
    async fn update_status(&self, order_id: &str, status: OrderStatus) -> Result<(), ActivityError> {
        self.record(ActivityCall::UpdateStatus(order_id.to_string(), status))
    }

    async fn charge(&self, order_id: &str) -> Result<bool, ActivityError> {
        self.record(ActivityCall::Charge(order_id.to_string()))?;
        Ok(self.charge_outcome.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_in_order() {
        let activities = RecordingActivities::new();
        let _ = activities.charge("o-1").await;
        let _ = activities.update_status("o-1", OrderStatus::Dispatched).await;

        assert_eq!(
            activities.calls(),
            vec![
                ActivityCall::Charge("o-1".to_string()),
                ActivityCall::UpdateStatus("o-1".to_string(), OrderStatus::Dispatched),
            ]
        );
        assert_eq!(activities.statuses_written(), vec![OrderStatus::Dispatched]);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed() {
        let activities = RecordingActivities::new();
        activities.fail_next_calls(1);

        assert!(activities.charge("o-1").await.is_err());
        assert!(matches!(activities.charge("o-1").await, Ok(true)));
    }

    #[tokio::test]
    async fn charge_outcome_is_scripted() {
        let activities = RecordingActivities::new();
        activities.set_charge_outcome(false);
        assert!(matches!(activities.charge("o-1").await, Ok(false)));
    }
}

//! Workflow engine behavior tests over scripted activities.

use orderflow_order::OrderStatus;
use orderflow_testing::RecordingActivities;
use orderflow_testing::activities::ActivityCall;
use orderflow_workflow::engine::{StartOptions, StartOutcome, WorkflowConfig, WorkflowEngine};
use orderflow_workflow::retry::ActivityRetryPolicy;
use orderflow_workflow::signal::Signal;
use orderflow_workflow::WorkflowError;
use std::sync::Arc;
use std::time::Duration;

fn start_options(order_id: &str) -> StartOptions {
    StartOptions {
        workflow_id: format!("order_{order_id}"),
        order_id: order_id.to_string(),
    }
}

fn fast_retry_config() -> WorkflowConfig {
    WorkflowConfig {
        activity_retry: ActivityRetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            multiplier: 1.0,
        },
        ..WorkflowConfig::default()
    }
}

async fn must_start(engine: &WorkflowEngine, order_id: &str) {
    let outcome = engine.start(start_options(order_id)).await;
    assert!(matches!(outcome, Ok(StartOutcome::Started)));
}

#[tokio::test(start_paused = true)]
async fn dispatched_then_delivered_completes_the_order() {
    let activities = Arc::new(RecordingActivities::new());
    let engine = WorkflowEngine::new(Arc::clone(&activities) as _, WorkflowConfig::default());

    must_start(&engine, "o-1").await;
    tokio::task::yield_now().await;

    engine
        .signal("order_o-1", Signal::Dispatched)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    engine
        .signal("order_o-1", Signal::Delivered)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    engine.wait_for_completion("order_o-1").await;

    assert!(engine.is_completed("order_o-1").await);
    assert_eq!(
        activities.calls(),
        vec![
            ActivityCall::Charge("o-1".to_string()),
            ActivityCall::UpdateStatus("o-1".to_string(), OrderStatus::Dispatched),
            ActivityCall::UpdateStatus("o-1".to_string(), OrderStatus::Completed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn dispatch_timeout_cancels_the_order() {
    let activities = Arc::new(RecordingActivities::new());
    let engine = WorkflowEngine::new(Arc::clone(&activities) as _, WorkflowConfig::default());

    must_start(&engine, "o-2").await;
    // let the instance charge and park on the dispatch timer
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    tokio::time::advance(Duration::from_secs(61)).await;
    engine.wait_for_completion("order_o-2").await;

    assert!(engine.is_completed("order_o-2").await);
    assert_eq!(activities.statuses_written(), vec![OrderStatus::Cancelled]);
}

#[tokio::test(start_paused = true)]
async fn cancel_signal_while_awaiting_dispatch() {
    let activities = Arc::new(RecordingActivities::new());
    let engine = WorkflowEngine::new(Arc::clone(&activities) as _, WorkflowConfig::default());

    must_start(&engine, "o-3").await;
    tokio::task::yield_now().await;

    engine
        .signal("order_o-3", Signal::Canceled)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    engine.wait_for_completion("order_o-3").await;

    assert_eq!(activities.statuses_written(), vec![OrderStatus::Cancelled]);
}

#[tokio::test(start_paused = true)]
async fn cancel_signal_in_transit() {
    let activities = Arc::new(RecordingActivities::new());
    let engine = WorkflowEngine::new(Arc::clone(&activities) as _, WorkflowConfig::default());

    must_start(&engine, "o-4").await;
    tokio::task::yield_now().await;

    engine
        .signal("order_o-4", Signal::Dispatched)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    engine
        .signal("order_o-4", Signal::Canceled)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    engine.wait_for_completion("order_o-4").await;

    assert_eq!(
        activities.statuses_written(),
        vec![OrderStatus::Dispatched, OrderStatus::Cancelled]
    );
}

#[tokio::test(start_paused = true)]
async fn out_of_window_delivery_is_ignored() {
    let activities = Arc::new(RecordingActivities::new());
    let engine = WorkflowEngine::new(Arc::clone(&activities) as _, WorkflowConfig::default());

    must_start(&engine, "o-5").await;
    tokio::task::yield_now().await;

    // delivered before dispatched: ignored, the dispatch window stays open
    engine
        .signal("order_o-5", Signal::Delivered)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    tokio::task::yield_now().await;
    assert!(engine.is_running("order_o-5").await);

    engine
        .signal("order_o-5", Signal::Dispatched)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    engine
        .signal("order_o-5", Signal::Delivered)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    engine.wait_for_completion("order_o-5").await;

    assert_eq!(
        activities.statuses_written(),
        vec![OrderStatus::Dispatched, OrderStatus::Completed]
    );
}

#[tokio::test(start_paused = true)]
async fn duplicate_dispatch_signals_are_absorbed() {
    let activities = Arc::new(RecordingActivities::new());
    let engine = WorkflowEngine::new(Arc::clone(&activities) as _, WorkflowConfig::default());

    must_start(&engine, "o-6").await;
    tokio::task::yield_now().await;

    for _ in 0..3 {
        engine
            .signal("order_o-6", Signal::Dispatched)
            .await
            .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    }
    engine
        .signal("order_o-6", Signal::Delivered)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    engine.wait_for_completion("order_o-6").await;

    // one transition per state change, however many duplicates arrive
    assert_eq!(
        activities.statuses_written(),
        vec![OrderStatus::Dispatched, OrderStatus::Completed]
    );
}

#[tokio::test(start_paused = true)]
async fn duplicate_starts_are_idempotent() {
    let activities = Arc::new(RecordingActivities::new());
    let engine = WorkflowEngine::new(Arc::clone(&activities) as _, WorkflowConfig::default());

    must_start(&engine, "o-7").await;
    let outcome = engine.start(start_options("o-7")).await;
    assert!(matches!(outcome, Ok(StartOutcome::AlreadyRunning)));

    engine
        .signal("order_o-7", Signal::Canceled)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    engine.wait_for_completion("order_o-7").await;

    let outcome = engine.start(start_options("o-7")).await;
    assert!(matches!(outcome, Ok(StartOutcome::AlreadyCompleted)));

    // one charge in total: the duplicates never spawned an instance
    let charges = activities
        .calls()
        .iter()
        .filter(|c| matches!(c, ActivityCall::Charge(_)))
        .count();
    assert_eq!(charges, 1);
}

#[tokio::test]
async fn signal_to_unknown_workflow_is_not_found() {
    let activities = Arc::new(RecordingActivities::new());
    let engine = WorkflowEngine::new(activities as _, WorkflowConfig::default());

    let result = engine.signal("order_missing", Signal::Dispatched).await;
    assert!(matches!(result, Err(WorkflowError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn signals_after_completion_are_silent_noops() {
    let activities = Arc::new(RecordingActivities::new());
    let engine = WorkflowEngine::new(Arc::clone(&activities) as _, WorkflowConfig::default());

    must_start(&engine, "o-8").await;
    tokio::task::yield_now().await;
    engine
        .signal("order_o-8", Signal::Canceled)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    engine.wait_for_completion("order_o-8").await;

    let result = engine.signal("order_o-8", Signal::Delivered).await;
    assert!(result.is_ok());
    assert_eq!(activities.statuses_written(), vec![OrderStatus::Cancelled]);
}

#[tokio::test(start_paused = true)]
async fn declined_payment_cancels_before_dispatch_wait() {
    let activities = Arc::new(RecordingActivities::new());
    activities.set_charge_outcome(false);
    let engine = WorkflowEngine::new(Arc::clone(&activities) as _, WorkflowConfig::default());

    must_start(&engine, "o-9").await;
    engine.wait_for_completion("order_o-9").await;

    assert!(engine.is_completed("order_o-9").await);
    assert_eq!(
        activities.calls(),
        vec![
            ActivityCall::Charge("o-9".to_string()),
            ActivityCall::UpdateStatus("o-9".to_string(), OrderStatus::Cancelled),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn transient_activity_failures_are_retried() {
    let activities = Arc::new(RecordingActivities::new());
    activities.fail_next_calls(1);
    let engine = WorkflowEngine::new(Arc::clone(&activities) as _, fast_retry_config());

    must_start(&engine, "o-10").await;
    tokio::task::yield_now().await;

    engine
        .signal("order_o-10", Signal::Dispatched)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    engine
        .signal("order_o-10", Signal::Delivered)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    engine.wait_for_completion("order_o-10").await;

    assert!(engine.is_completed("order_o-10").await);
    // first charge failed transiently and was re-executed
    let charges = activities
        .calls()
        .iter()
        .filter(|c| matches!(c, ActivityCall::Charge(_)))
        .count();
    assert_eq!(charges, 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_activity_retries_fail_the_instance_restartably() {
    let activities = Arc::new(RecordingActivities::new());
    activities.fail_next_calls(10);
    let engine = WorkflowEngine::new(Arc::clone(&activities) as _, fast_retry_config());

    must_start(&engine, "o-11").await;
    engine.wait_for_completion("order_o-11").await;

    // the instance failed: neither running nor completed, so it can be
    // started again once the fault clears
    assert!(!engine.is_running("order_o-11").await);
    assert!(!engine.is_completed("order_o-11").await);

    activities.fail_next_calls(0);
    must_start(&engine, "o-11").await;
    tokio::task::yield_now().await;
    engine
        .signal("order_o-11", Signal::Canceled)
        .await
        .unwrap_or_else(|e| unreachable!("signal failed: {e}"));
    engine.wait_for_completion("order_o-11").await;
    assert!(engine.is_completed("order_o-11").await);
}

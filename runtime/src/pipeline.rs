//! Failure routing: attempt counting, backoff, retry and DLQ republish.
//!
//! Invoked by the consumer runtime whenever a registered handler returns an
//! error. Every path through [`FailurePipeline::handle_failure`] ends with
//! the caller committing the source offset: republish to a retry or DLQ
//! topic is the only redelivery mechanism.

use orderflow_core::message::Message;
use orderflow_core::{MessageProducer, TopicRoutes};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Routes failed messages to their retry or dead-letter topic.
///
/// Shared across all partition loops; the backoff sleep is scoped to the
/// handling of one message and observes the governing cancellation token,
/// so shutdown aborts pending retries promptly (the offset commit still
/// happens in the caller).
pub struct FailurePipeline {
    producer: Arc<dyn MessageProducer>,
    routes: TopicRoutes,
    shutdown: CancellationToken,
}

impl FailurePipeline {
    /// Create a pipeline over the shared producer and routing table.
    #[must_use]
    pub fn new(
        producer: Arc<dyn MessageProducer>,
        routes: TopicRoutes,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            producer,
            routes,
            shutdown,
        }
    }

    /// The routing table this pipeline publishes against.
    #[must_use]
    pub const fn routes(&self) -> &TopicRoutes {
        &self.routes
    }

    /// Handle a failed message delivery.
    ///
    /// - DLQ topics are terminal: the failure is logged, nothing is
    ///   republished.
    /// - Topics without a retry policy log and drop.
    /// - Otherwise the attempt counter is incremented; at or past
    ///   `max_attempts` the message goes to the DLQ route, else the
    ///   backoff elapses (raced against shutdown) and the message goes to
    ///   the retry route.
    ///
    /// Republish failures are logged and swallowed: refusing to advance
    /// the source offset would loop the partition forever.
    pub async fn handle_failure(&self, message: &Message, error: &anyhow::Error) {
        if self.routes.is_dlq(&message.topic) {
            tracing::warn!(
                topic = %message.topic,
                offset = message.offset,
                error = %error,
                "Handler failed on DLQ topic, not retrying"
            );
            return;
        }

        let Some(policy) = self.routes.policy_for(&message.topic) else {
            tracing::warn!(
                topic = %message.topic,
                offset = message.offset,
                error = %error,
                "No retry policy for topic, dropping failed message"
            );
            return;
        };

        let attempt = message.attempt() + 1;
        tracing::error!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            attempt,
            max_attempts = policy.max_attempts,
            error = %error,
            "Handler error"
        );

        let headers = message.headers.with_attempt(attempt);

        if attempt >= policy.max_attempts {
            let dlq_topic = self.routes.dlq_topic(&message.topic);
            match self
                .producer
                .send(&dlq_topic, &message.key, &message.value, &headers)
                .await
            {
                Ok(_) => {
                    tracing::info!(topic = %dlq_topic, attempt, "Message sent to DLQ");
                }
                Err(e) => {
                    tracing::error!(topic = %dlq_topic, error = %e, "Failed to publish to DLQ");
                }
            }
            return;
        }

        if !policy.backoff.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(policy.backoff) => {}
                () = self.shutdown.cancelled() => {
                    tracing::debug!(
                        topic = %message.topic,
                        offset = message.offset,
                        "Shutdown during retry backoff, skipping republish"
                    );
                    return;
                }
            }
        }

        let retry_topic = self.routes.retry_topic(&message.topic);
        match self
            .producer
            .send(&retry_topic, &message.key, &message.value, &headers)
            .await
        {
            Ok(_) => {
                tracing::info!(topic = %retry_topic, attempt, "Message sent to retry topic");
            }
            Err(e) => {
                tracing::error!(topic = %retry_topic, error = %e, "Failed to publish to retry topic");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orderflow_core::broker::{BrokerError, Placement};
    use orderflow_core::message::Headers;
    use orderflow_core::retry::RetryPolicy;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CapturingProducer {
        sent: Mutex<Vec<(String, Vec<u8>, Headers)>>,
        fail: bool,
    }

    #[async_trait]
    impl MessageProducer for CapturingProducer {
        async fn send(
            &self,
            topic: &str,
            _key: &[u8],
            value: &[u8],
            headers: &Headers,
        ) -> Result<Placement, BrokerError> {
            if self.fail {
                return Err(BrokerError::PublishFailed {
                    topic: topic.to_string(),
                    reason: "broker down".to_string(),
                });
            }
            let mut sent = self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            sent.push((topic.to_string(), value.to_vec(), headers.clone()));
            Ok((0, sent.len() as i64 - 1))
        }
    }

    fn routes() -> TopicRoutes {
        TopicRoutes::builder()
            .policy("orders", RetryPolicy::new(3, Duration::ZERO))
            .build()
    }

    fn pipeline(producer: Arc<CapturingProducer>) -> FailurePipeline {
        FailurePipeline::new(producer, routes(), CancellationToken::new())
    }

    fn failed(topic: &str, attempt: Option<u32>) -> Message {
        let mut msg = Message::new(topic, b"o-1".to_vec(), b"{}".to_vec());
        if let Some(n) = attempt {
            msg.headers = msg.headers.with_attempt(n);
        }
        msg
    }

    #[tokio::test]
    async fn first_failure_republishes_to_retry_with_attempt_one() {
        let producer = Arc::new(CapturingProducer::default());
        let pipeline = pipeline(Arc::clone(&producer));

        pipeline
            .handle_failure(&failed("orders", None), &anyhow::anyhow!("boom"))
            .await;

        let sent = producer.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "orders.retry");
        assert_eq!(sent[0].2.attempt(), 1);
    }

    #[tokio::test]
    async fn exhausted_attempts_go_to_dlq_exactly_once() {
        let producer = Arc::new(CapturingProducer::default());
        let pipeline = pipeline(Arc::clone(&producer));

        // attempt header 2, max_attempts 3: this failure exhausts the budget
        pipeline
            .handle_failure(&failed("orders.retry", Some(2)), &anyhow::anyhow!("boom"))
            .await;

        let sent = producer.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "orders.dlq");
        assert_eq!(sent[0].2.attempt(), 3);
    }

    #[tokio::test]
    async fn topic_without_policy_is_dropped_silently() {
        let producer = Arc::new(CapturingProducer::default());
        let pipeline = pipeline(Arc::clone(&producer));

        pipeline
            .handle_failure(&failed("shipments", None), &anyhow::anyhow!("boom"))
            .await;

        let sent = producer.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn dlq_topic_failures_are_terminal() {
        let producer = Arc::new(CapturingProducer::default());
        let pipeline = pipeline(Arc::clone(&producer));

        pipeline
            .handle_failure(&failed("orders.dlq", Some(3)), &anyhow::anyhow!("boom"))
            .await;

        let sent = producer.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn republish_failure_is_swallowed() {
        let producer = Arc::new(CapturingProducer {
            fail: true,
            ..CapturingProducer::default()
        });
        let pipeline = pipeline(Arc::clone(&producer));

        // must not panic or propagate; the caller still commits the offset
        pipeline
            .handle_failure(&failed("orders", None), &anyhow::anyhow!("boom"))
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_aborts_retry_publish() {
        let producer = Arc::new(CapturingProducer::default());
        let token = CancellationToken::new();
        let routes = TopicRoutes::builder()
            .policy("orders", RetryPolicy::new(3, Duration::from_secs(30)))
            .build();
        let pipeline = FailurePipeline::new(Arc::clone(&producer) as _, routes, token.clone());

        let msg = failed("orders", None);
        let handle = tokio::spawn(async move {
            pipeline.handle_failure(&msg, &anyhow::anyhow!("boom")).await;
        });

        // let the backoff sleep register, then cancel instead of advancing time
        tokio::task::yield_now().await;
        token.cancel();
        handle.await.unwrap_or_else(|e| unreachable!("task panicked: {e}"));

        let sent = producer.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert!(sent.is_empty(), "cancelled backoff must not republish");
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_elapses_before_retry_publish() {
        let producer = Arc::new(CapturingProducer::default());
        let routes = TopicRoutes::builder()
            .policy("orders", RetryPolicy::new(3, Duration::from_secs(5)))
            .build();
        let pipeline =
            FailurePipeline::new(Arc::clone(&producer) as _, routes, CancellationToken::new());

        let msg = failed("orders", None);
        let handle = tokio::spawn(async move {
            pipeline.handle_failure(&msg, &anyhow::anyhow!("boom")).await;
        });

        tokio::task::yield_now().await;
        {
            let sent = producer.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            assert!(sent.is_empty(), "nothing published before backoff elapses");
        }

        tokio::time::advance(Duration::from_secs(5)).await;
        handle.await.unwrap_or_else(|e| unreachable!("task panicked: {e}"));

        let sent = producer.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "orders.retry");
    }
}

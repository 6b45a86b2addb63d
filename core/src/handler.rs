//! Per-topic message handling contract.
//!
//! The consumer runtime dispatches each message to the [`MessageHandler`]
//! registered for its topic. A handler error routes the message through the
//! reliability pipeline (retry topic, then DLQ); returning `Ok` marks it
//! consumed.
//!
//! Poison input is not an error: a payload that will never parse will never
//! succeed either, so [`json_handler`] logs and drops it instead of
//! retrying (see the platform error taxonomy).

use crate::message::Message;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

/// A per-topic message handler.
///
/// Handlers are re-invoked for the same message after crashes and
/// rebalances (at-least-once delivery), so they must be idempotent.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one message.
    ///
    /// # Errors
    ///
    /// Any error is treated as a processing failure and handed to the
    /// reliability pipeline; it does not stop the partition loop.
    async fn handle(&self, message: &Message) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: MessageHandler + ?Sized> MessageHandler for Arc<T> {
    async fn handle(&self, message: &Message) -> anyhow::Result<()> {
        (**self).handle(message).await
    }
}

/// Decode a JSON payload, logging and discarding poison input.
///
/// Returns `None` when the payload does not parse; the caller should treat
/// that as consumed (malformed input will never succeed, so retrying it is
/// pointless).
#[must_use]
pub fn decode_json<T: DeserializeOwned>(message: &Message) -> Option<T> {
    match serde_json::from_slice(&message.value) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::error!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "Dropping unparseable message (will never succeed, not retried)"
            );
            None
        }
    }
}

/// Wrap a typed async function as a [`MessageHandler`], decoding the
/// payload as JSON.
///
/// Decode failures are logged and swallowed (the message is consumed
/// without retry); only errors from the typed handler itself propagate to
/// the reliability pipeline.
///
/// # Example
///
/// ```
/// use orderflow_core::handler::json_handler;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct OrderEvent {
///     order_id: String,
/// }
///
/// let handler = json_handler(|event: OrderEvent, _msg| async move {
///     tracing::info!(order_id = %event.order_id, "order event");
///     Ok(())
/// });
/// # let _ = handler;
/// ```
pub fn json_handler<T, F, Fut>(handler: F) -> JsonHandler<T, F>
where
    T: DeserializeOwned + Send,
    F: Fn(T, Message) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    JsonHandler {
        handler,
        _payload: std::marker::PhantomData,
    }
}

/// Adapter returned by [`json_handler`].
pub struct JsonHandler<T, F> {
    handler: F,
    _payload: std::marker::PhantomData<fn() -> T>,
}

#[async_trait]
impl<T, F, Fut> MessageHandler for JsonHandler<T, F>
where
    T: DeserializeOwned + Send,
    F: Fn(T, Message) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, message: &Message) -> anyhow::Result<()> {
        let Some(payload) = decode_json::<T>(message) else {
            return Ok(());
        };

        tracing::debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            attempt = message.attempt(),
            "Processing message"
        );

        (self.handler)(payload, message.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Deserialize)]
    struct Event {
        id: String,
    }

    #[tokio::test]
    async fn json_handler_decodes_and_invokes() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let handler = json_handler(|event: Event, _msg| async move {
            assert_eq!(event.id, "o-1");
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let msg = Message::new("orders", vec![], br#"{"id":"o-1"}"#.to_vec());
        assert!(handler.handle(&msg).await.is_ok());
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn json_handler_drops_poison_payload() {
        let handler = json_handler(|_event: Event, _msg| async move {
            anyhow::bail!("handler must not run for poison input")
        });

        let msg = Message::new("orders", vec![], b"not json".to_vec());
        // consumed without error: poison messages are never retried
        assert!(handler.handle(&msg).await.is_ok());
    }

    #[tokio::test]
    async fn json_handler_propagates_business_errors() {
        let handler =
            json_handler(|_event: Event, _msg| async move { anyhow::bail!("downstream down") });

        let msg = Message::new("orders", vec![], br#"{"id":"o-2"}"#.to_vec());
        assert!(handler.handle(&msg).await.is_err());
    }
}

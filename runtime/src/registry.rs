//! Handler registration and topic wiring.
//!
//! Registering a topic with a retry policy automatically wires the derived
//! retry topic to the same handler and the same policy, so retried
//! messages take the identical code path as first deliveries. DLQ topics
//! are intentionally not subscribed: dead letters wait for manual
//! inspection.

use orderflow_core::retry::{RetryPolicy, TopicRoutes, TopicRoutesBuilder};
use orderflow_core::MessageHandler;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable topic → handler table plus the derived routing configuration.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
    topics: Vec<String>,
    routes: TopicRoutes,
}

impl HandlerRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder {
            handlers: HashMap::new(),
            topics: Vec::new(),
            routes: TopicRoutes::builder(),
        }
    }

    /// The handler registered for `topic`, if any.
    #[must_use]
    pub fn handler_for(&self, topic: &str) -> Option<&Arc<dyn MessageHandler>> {
        self.handlers.get(topic)
    }

    /// All topics to subscribe (base topics plus derived retry topics).
    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// The routing table shared with the failure pipeline.
    #[must_use]
    pub const fn routes(&self) -> &TopicRoutes {
        &self.routes
    }
}

/// Builder for [`HandlerRegistry`].
///
/// Suffix overrides must be set before the first `retryable_topic` call,
/// since the derived retry topic name is fixed at registration time.
pub struct HandlerRegistryBuilder {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
    topics: Vec<String>,
    routes: TopicRoutesBuilder,
}

impl HandlerRegistryBuilder {
    /// Override the retry topic suffix (default `.retry`).
    #[must_use]
    pub fn retry_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.routes = self.routes.retry_suffix(suffix);
        self
    }

    /// Override the DLQ topic suffix (default `.dlq`).
    #[must_use]
    pub fn dlq_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.routes = self.routes.dlq_suffix(suffix);
        self
    }

    /// Register a handler for `topic` with retry disabled: failures are
    /// logged and dropped.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>, handler: Arc<dyn MessageHandler>) -> Self {
        let topic = topic.into();
        if topic.is_empty() {
            return self;
        }
        self.topics.push(topic.clone());
        self.handlers.insert(topic, handler);
        self
    }

    /// Register a handler for `topic` with the given retry policy.
    ///
    /// The derived retry topic is subscribed with the same handler; the
    /// policy applies to both so the attempt budget spans the whole chain.
    #[must_use]
    pub fn retryable_topic(
        mut self,
        topic: impl Into<String>,
        policy: RetryPolicy,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        let topic = topic.into();
        if topic.is_empty() {
            return self;
        }
        // peek the suffix the eventual routing table will use
        let retry_topic = self.routes.clone().build().retry_topic(&topic);

        self.topics.push(topic.clone());
        self.topics.push(retry_topic.clone());
        self.handlers.insert(topic.clone(), Arc::clone(&handler));
        self.handlers.insert(retry_topic, handler);
        self.routes = self.routes.policy(topic, policy);
        self
    }

    /// Finalize the registry.
    #[must_use]
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
            topics: self.topics,
            routes: self.routes.build(),
        }
    }
}

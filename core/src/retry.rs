//! Per-topic retry policy and derived retry/DLQ topic routing.
//!
//! A topic with a [`RetryPolicy`] gets two derived routes:
//! `<topic><retry_suffix>` (same handler as the base topic) and
//! `<topic><dlq_suffix>` (terminal sink past `max_attempts`). A topic
//! without a policy has retry disabled: failures are logged and dropped.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Default suffix for retry topics.
pub const DEFAULT_RETRY_SUFFIX: &str = ".retry";
/// Default suffix for dead-letter topics.
pub const DEFAULT_DLQ_SUFFIX: &str = ".dlq";

/// Retry behavior for one base topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts before the message is dead-lettered (>= 1).
    pub max_attempts: u32,
    /// Delay applied before each republish to the retry topic.
    #[serde(with = "humantime_millis")]
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` below 1 is clamped to 1.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

mod humantime_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Topic routing table: retry/DLQ suffixes plus per-topic policies.
///
/// Policies are keyed by base topic; [`TopicRoutes::policy_for`] resolves
/// a retry topic back to its base so the retry route shares the base
/// policy. DLQ topics never resolve to a policy.
#[derive(Debug, Clone)]
pub struct TopicRoutes {
    retry_suffix: String,
    dlq_suffix: String,
    policies: HashMap<String, RetryPolicy>,
}

impl Default for TopicRoutes {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TopicRoutes {
    /// Create a new builder with default suffixes.
    #[must_use]
    pub fn builder() -> TopicRoutesBuilder {
        TopicRoutesBuilder {
            retry_suffix: None,
            dlq_suffix: None,
            policies: HashMap::new(),
        }
    }

    /// The configured retry suffix.
    #[must_use]
    pub fn retry_suffix(&self) -> &str {
        &self.retry_suffix
    }

    /// The configured DLQ suffix.
    #[must_use]
    pub fn dlq_suffix(&self) -> &str {
        &self.dlq_suffix
    }

    /// Strip the retry suffix, if present, to recover the base topic.
    #[must_use]
    pub fn base_topic<'a>(&self, topic: &'a str) -> &'a str {
        topic.strip_suffix(self.retry_suffix.as_str()).unwrap_or(topic)
    }

    /// Derived retry topic for `topic` (idempotent on retry topics).
    #[must_use]
    pub fn retry_topic(&self, topic: &str) -> String {
        format!("{}{}", self.base_topic(topic), self.retry_suffix)
    }

    /// Derived DLQ topic for `topic` (resolved via the base topic).
    #[must_use]
    pub fn dlq_topic(&self, topic: &str) -> String {
        format!("{}{}", self.base_topic(topic), self.dlq_suffix)
    }

    /// Whether `topic` is a dead-letter topic.
    #[must_use]
    pub fn is_dlq(&self, topic: &str) -> bool {
        topic.ends_with(self.dlq_suffix.as_str())
    }

    /// Resolve the retry policy for `topic`, following retry topics back
    /// to their base. `None` means retry is disabled for the topic.
    #[must_use]
    pub fn policy_for(&self, topic: &str) -> Option<RetryPolicy> {
        if self.is_dlq(topic) {
            return None;
        }
        self.policies.get(self.base_topic(topic)).copied()
    }
}

/// Builder for [`TopicRoutes`].
#[derive(Debug, Clone)]
pub struct TopicRoutesBuilder {
    retry_suffix: Option<String>,
    dlq_suffix: Option<String>,
    policies: HashMap<String, RetryPolicy>,
}

impl TopicRoutesBuilder {
    /// Override the retry topic suffix (default `.retry`).
    #[must_use]
    pub fn retry_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.retry_suffix = Some(suffix.into());
        self
    }

    /// Override the DLQ topic suffix (default `.dlq`).
    #[must_use]
    pub fn dlq_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.dlq_suffix = Some(suffix.into());
        self
    }

    /// Enable retry for `base_topic` with the given policy.
    #[must_use]
    pub fn policy(mut self, base_topic: impl Into<String>, policy: RetryPolicy) -> Self {
        self.policies.insert(base_topic.into(), policy);
        self
    }

    /// Build the routing table, applying default suffixes where unset.
    #[must_use]
    pub fn build(self) -> TopicRoutes {
        TopicRoutes {
            retry_suffix: self
                .retry_suffix
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_RETRY_SUFFIX.to_string()),
            dlq_suffix: self
                .dlq_suffix
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_DLQ_SUFFIX.to_string()),
            policies: self.policies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes() -> TopicRoutes {
        TopicRoutes::builder()
            .policy("orders", RetryPolicy::new(3, Duration::from_millis(10)))
            .build()
    }

    #[test]
    fn default_suffixes_apply() {
        let routes = routes();
        assert_eq!(routes.retry_topic("orders"), "orders.retry");
        assert_eq!(routes.dlq_topic("orders"), "orders.dlq");
    }

    #[test]
    fn retry_topic_routes_resolve_to_base() {
        let routes = routes();
        assert_eq!(routes.base_topic("orders.retry"), "orders");
        assert_eq!(routes.retry_topic("orders.retry"), "orders.retry");
        assert_eq!(routes.dlq_topic("orders.retry"), "orders.dlq");
    }

    #[test]
    fn retry_topic_shares_base_policy() {
        let routes = routes();
        let base = routes.policy_for("orders");
        let retry = routes.policy_for("orders.retry");
        assert_eq!(base, retry);
        assert!(base.is_some());
    }

    #[test]
    fn unconfigured_topic_has_no_policy() {
        assert!(routes().policy_for("shipments").is_none());
    }

    #[test]
    fn dlq_topics_never_have_a_policy() {
        let routes = TopicRoutes::builder()
            .policy("orders.dlq", RetryPolicy::new(3, Duration::ZERO))
            .build();
        assert!(routes.is_dlq("orders.dlq"));
        assert!(routes.policy_for("orders.dlq").is_none());
    }

    #[test]
    fn custom_suffixes() {
        let routes = TopicRoutes::builder()
            .retry_suffix("-r")
            .dlq_suffix("-dead")
            .policy("orders", RetryPolicy::new(2, Duration::ZERO))
            .build();
        assert_eq!(routes.retry_topic("orders"), "orders-r");
        assert_eq!(routes.dlq_topic("orders-r"), "orders-dead");
    }

    #[test]
    fn zero_max_attempts_clamps_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}

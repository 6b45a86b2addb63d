//! The immutable unit of transport and its header bookkeeping.
//!
//! A [`Message`] is produced once and never mutated. The ordered header
//! list carries the reserved `x-attempt` key (ASCII decimal, absent = 0)
//! used by the reliability pipeline to count redeliveries; unrelated
//! producers sharing a topic must leave it alone.

use chrono::{DateTime, Utc};

/// Reserved header key carrying the retry attempt counter.
///
/// The value is an ASCII decimal integer. An absent header means attempt 0
/// (first delivery). Matching is case-insensitive on read and replace.
pub const ATTEMPT_HEADER: &str = "x-attempt";

/// An ordered list of key/value headers attached to a message.
///
/// Order is preserved across republish; updating `x-attempt` removes any
/// existing entry (case-insensitively) and appends the new value, so the
/// counter is always the last header after a retry hop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, Vec<u8>)>);

impl Headers {
    /// Create an empty header list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a header, preserving insertion order.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.0.push((key.into(), value.into()));
    }

    /// Get the first value for `key` (case-insensitive).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_slice())
    }

    /// Iterate over all headers in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the `x-attempt` counter. Absent or unparseable means 0.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.get(ATTEMPT_HEADER)
            .and_then(|v| std::str::from_utf8(v).ok())
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Return a copy of the headers with `x-attempt` set to `attempt`.
    ///
    /// All other headers are carried over in order; any existing
    /// `x-attempt` entry is dropped before the new value is appended.
    #[must_use]
    pub fn with_attempt(&self, attempt: u32) -> Self {
        let mut updated: Vec<(String, Vec<u8>)> = self
            .0
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case(ATTEMPT_HEADER))
            .cloned()
            .collect();
        updated.push((ATTEMPT_HEADER.to_string(), attempt.to_string().into_bytes()));
        Self(updated)
    }
}

impl FromIterator<(String, Vec<u8>)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An immutable message consumed from or produced to the broker.
///
/// `partition` and `offset` are assigned by the broker; messages built
/// locally for publishing leave them at their defaults. The `key` drives
/// partition affinity: all events for one order share a key and therefore
/// a partition, which is what makes per-order ordering possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Topic the message belongs to.
    pub topic: String,
    /// Partition the message was read from (broker-assigned).
    pub partition: i32,
    /// Offset within the partition, monotonic per partition.
    pub offset: i64,
    /// Partition affinity key.
    pub key: Vec<u8>,
    /// Opaque payload bytes.
    pub value: Vec<u8>,
    /// Ordered header list.
    pub headers: Headers,
    /// Broker timestamp, or producer wall clock when the broker omits one.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Build a message for publishing (no partition/offset yet).
    #[must_use]
    pub fn new(topic: impl Into<String>, key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition: -1,
            offset: -1,
            key,
            value,
            headers: Headers::new(),
            timestamp: Utc::now(),
        }
    }

    /// Attach headers, builder style.
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// The retry attempt this delivery represents (0 = first delivery).
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.headers.attempt()
    }
}

//! Deserializable broker settings.
//!
//! The process bootstrap (outside this core) loads these from its
//! configuration source and threads them into the kafka builders; nothing
//! here reads the environment or global state.

use serde::Deserialize;

/// Producer tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerConfig {
    /// Acknowledgement mode: `0`, `1` or `all`.
    #[serde(default = "default_acks")]
    pub required_acks: String,
    /// Compression codec: `none`, `gzip`, `snappy`, `lz4`, `zstd`.
    #[serde(default = "default_compression")]
    pub compression: String,
    /// Send timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            required_acks: default_acks(),
            compression: default_compression(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Consumer-group tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    /// Consumer group id.
    pub group_id: String,
    /// Session timeout in milliseconds.
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
    /// Where new groups start reading: `earliest` or `latest`.
    #[serde(default = "default_offset_reset")]
    pub auto_offset_reset: String,
}

/// Top-level broker settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Comma-separated broker addresses.
    pub brokers: String,
    /// Producer settings.
    #[serde(default)]
    pub producer: ProducerConfig,
    /// Consumer settings.
    pub consumer: ConsumerConfig,
    /// Retry topic suffix override (default `.retry`).
    #[serde(default)]
    pub retry_suffix: Option<String>,
    /// DLQ topic suffix override (default `.dlq`).
    #[serde(default)]
    pub dlq_suffix: Option<String>,
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_compression() -> String {
    "none".to_string()
}

const fn default_timeout_ms() -> u64 {
    5000
}

const fn default_session_timeout_ms() -> u64 {
    6000
}

fn default_offset_reset() -> String {
    "latest".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let json = r#"{
            "brokers": "localhost:9092",
            "consumer": { "group_id": "orderflow-worker" }
        }"#;
        let cfg: BrokerConfig = serde_json::from_str(json).unwrap_or_else(|e| {
            unreachable!("config should parse: {e}");
        });
        assert_eq!(cfg.producer.required_acks, "all");
        assert_eq!(cfg.consumer.session_timeout_ms, 6000);
        assert_eq!(cfg.consumer.auto_offset_reset, "latest");
        assert!(cfg.retry_suffix.is_none());
    }
}

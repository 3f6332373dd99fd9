//! Broker producer settings

use super::enrichment::EnrichmentConfig;
use super::validate::{Binder, Diagnostics};
use super::values::{AckPolicy, Compression, IdStrategy, KeyStrategy, PartitionStrategy};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BROKER: &str = "localhost:9092";
pub const DEFAULT_TOPIC: &str = "logs";
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Certificate files handed to the broker client untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsMaterial {
    pub ca_file: PathBuf,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub partition: PartitionStrategy,
    pub key: KeyStrategy,
    /// Fixed key value, or the field name for the extracted strategy
    pub key_name: String,
    /// Must match the enrichment strategy when set
    pub id_strategy: Option<IdStrategy>,
    pub compression: Compression,
    pub acks: AckPolicy,
    pub flush_interval: Duration,
    pub retry_max: u32,
    pub retry_backoff: Duration,
    pub metadata_retry_max: u32,
    pub metadata_retry_backoff: Duration,
    pub queue_capacity: usize,
    pub enable_tls: bool,
    pub tls: Option<TlsMaterial>,
}

/// Current OS user, the default fixed key
fn default_key_name() -> String {
    ["USER", "USERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "logger".to_string())
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            brokers: vec![DEFAULT_BROKER.to_string()],
            topic: DEFAULT_TOPIC.to_string(),
            partition: PartitionStrategy::Random,
            key: KeyStrategy::Fixed,
            key_name: default_key_name(),
            id_strategy: None,
            compression: Compression::Snappy,
            acks: AckPolicy::Local,
            flush_interval: Duration::from_millis(500),
            retry_max: 10,
            retry_backoff: Duration::from_millis(100),
            metadata_retry_max: 10,
            metadata_retry_backoff: Duration::from_millis(2000),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            enable_tls: false,
            tls: None,
        }
    }
}

impl ProducerConfig {
    pub const COMPONENT: &'static str = "producer";

    pub fn apply_layer(&mut self, binder: &mut Binder<'_>) {
        binder.list("brokers", &mut self.brokers);
        binder.string("topic", &mut self.topic);
        binder.parse("partition", &mut self.partition);
        binder.parse("key", &mut self.key);
        binder.string("key_name", &mut self.key_name);
        binder.parse_opt("id_strategy", &mut self.id_strategy);
        binder.parse("compression", &mut self.compression);
        binder.parse("acks", &mut self.acks);
        binder.millis("flush_interval_ms", &mut self.flush_interval);
        binder.non_negative("retry_max", &mut self.retry_max);
        binder.millis("retry_backoff_ms", &mut self.retry_backoff);
        binder.non_negative("metadata_retry_max", &mut self.metadata_retry_max);
        binder.millis("metadata_retry_backoff_ms", &mut self.metadata_retry_backoff);
        binder.non_negative("queue_capacity", &mut self.queue_capacity);
        binder.bool("enable_tls", &mut self.enable_tls);

        let mut tls = self.tls.clone().unwrap_or_default();
        let before = tls.clone();
        binder.path("tls_ca_file", &mut tls.ca_file);
        binder.path_opt("tls_cert_file", &mut tls.cert_file);
        binder.path_opt("tls_key_file", &mut tls.key_file);
        if tls != before {
            self.tls = Some(tls);
        }
    }

    pub fn check(&self, diagnostics: &mut Diagnostics) {
        let c = Self::COMPONENT;

        if self.brokers.is_empty() {
            diagnostics.reject(c, "brokers", "", "at least one broker is required");
        }
        if self.topic.trim().is_empty() {
            diagnostics.reject(c, "topic", self.topic.as_str(), "must not be empty");
        }
        if self.queue_capacity == 0 {
            diagnostics.reject(c, "queue_capacity", "0", "must be greater than zero");
        }
        if matches!(self.key, KeyStrategy::Fixed | KeyStrategy::Extracted)
            && self.key_name.trim().is_empty()
        {
            diagnostics.reject(
                c,
                "key_name",
                "",
                format!("required when key is {}", self.key),
            );
        }

        match (&self.tls, self.enable_tls) {
            (None, true) => {
                diagnostics.reject(c, "tls_ca_file", "", "required when enable_tls is true")
            }
            (Some(tls), enabled) => {
                if enabled && tls.ca_file.as_os_str().is_empty() {
                    diagnostics.reject(c, "tls_ca_file", "", "required when enable_tls is true");
                }
                let missing = match (&tls.cert_file, &tls.key_file) {
                    (Some(cert), None) => Some(("tls_key_file", cert)),
                    (None, Some(key)) => Some(("tls_cert_file", key)),
                    _ => None,
                };
                if let Some((field, other)) = missing {
                    diagnostics.reject(
                        c,
                        field,
                        other.display().to_string(),
                        "tls_cert_file and tls_key_file must be set together",
                    );
                }
            }
            (None, false) => {}
        }
    }

    /// One identifier strategy per logger
    pub fn check_id_strategy(&self, enrichment: &EnrichmentConfig, diagnostics: &mut Diagnostics) {
        if let Some(strategy) = self.id_strategy {
            if strategy != enrichment.id_strategy {
                diagnostics.reject(
                    Self::COMPONENT,
                    "id_strategy",
                    strategy.as_str(),
                    format!(
                        "conflicts with enrichment id_strategy '{}'",
                        enrichment.id_strategy
                    ),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::source::MapSource;

    fn bind(source: &MapSource) -> (ProducerConfig, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let mut config = ProducerConfig::default();
        config.apply_layer(&mut Binder::new(ProducerConfig::COMPONENT, source, &mut diagnostics));
        config.check(&mut diagnostics);
        (config, diagnostics)
    }

    #[test]
    fn test_defaults() {
        let config = ProducerConfig::default();
        assert_eq!(config.brokers, vec!["localhost:9092"]);
        assert_eq!(config.key, KeyStrategy::Fixed);
        assert_eq!(config.compression, Compression::Snappy);
        assert_eq!(config.flush_interval, Duration::from_millis(500));
        assert!(!config.key_name.is_empty());

        let mut diagnostics = Diagnostics::new();
        config.check(&mut diagnostics);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_layer_overrides() {
        let source = MapSource::new("test")
            .with("brokers", "k1:9092,k2:9092")
            .with("key", "extracted")
            .with("key_name", "tenant")
            .with("flush_interval_ms", "0")
            .with("acks", "all");
        let (config, diagnostics) = bind(&source);

        assert!(diagnostics.is_empty());
        assert_eq!(config.brokers.len(), 2);
        assert_eq!(config.key, KeyStrategy::Extracted);
        assert_eq!(config.flush_interval, Duration::ZERO);
        assert_eq!(config.acks, AckPolicy::All);
    }

    #[test]
    fn test_negative_retry_is_rejected() {
        let source = MapSource::new("test").with("retry_max", "-5");
        let (config, diagnostics) = bind(&source);

        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(config.retry_max, 10);
    }

    #[test]
    fn test_tls_requires_material() {
        let source = MapSource::new("test").with("enable_tls", "true");
        let (_, diagnostics) = bind(&source);
        assert_eq!(diagnostics.iter().next().map(|d| d.field.as_str()), Some("tls_ca_file"));

        let source = MapSource::new("test")
            .with("enable_tls", "true")
            .with("tls_ca_file", "/etc/ssl/ca.pem")
            .with("tls_cert_file", "/etc/ssl/client.pem");
        let (config, diagnostics) = bind(&source);
        assert!(config.tls.is_some());
        assert_eq!(diagnostics.iter().next().map(|d| d.field.as_str()), Some("tls_key_file"));
    }

    #[test]
    fn test_key_name_required_for_extracted() {
        let source = MapSource::new("test").with("key", "extracted").with("key_name", "");
        let (_, diagnostics) = bind(&source);
        assert_eq!(diagnostics.error_count(), 1);
    }

    #[test]
    fn test_conflicting_id_strategy() {
        let config = ProducerConfig {
            id_strategy: Some(IdStrategy::Uuid),
            ..Default::default()
        };
        let mut diagnostics = Diagnostics::new();
        config.check_id_strategy(&EnrichmentConfig::default(), &mut diagnostics);
        assert_eq!(diagnostics.error_count(), 1);

        let matching = ProducerConfig {
            id_strategy: Some(IdStrategy::Hmac),
            ..Default::default()
        };
        let mut diagnostics = Diagnostics::new();
        matching.check_id_strategy(&EnrichmentConfig::default(), &mut diagnostics);
        assert!(diagnostics.is_empty());
    }
}

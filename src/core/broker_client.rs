//! Message broker client seam

use super::error::Result;
use crate::config::{AckPolicy, Compression, PartitionStrategy, ProducerConfig, TlsMaterial};
use async_trait::async_trait;
use std::time::Duration;

/// Delivery settings the client applies; the logger never interprets them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub brokers: Vec<String>,
    pub partition: PartitionStrategy,
    pub compression: Compression,
    pub acks: AckPolicy,
    pub retry_max: u32,
    pub retry_backoff: Duration,
    pub metadata_retry_max: u32,
    pub metadata_retry_backoff: Duration,
    /// Present only when TLS is enabled
    pub tls: Option<TlsMaterial>,
}

impl DeliveryPolicy {
    pub fn from_config(config: &ProducerConfig) -> Self {
        Self {
            brokers: config.brokers.clone(),
            partition: config.partition,
            compression: config.compression,
            acks: config.acks,
            retry_max: config.retry_max,
            retry_backoff: config.retry_backoff,
            metadata_retry_max: config.metadata_retry_max,
            metadata_retry_backoff: config.metadata_retry_backoff,
            tls: config.tls.clone().filter(|_| config.enable_tls),
        }
    }
}

/// Asynchronous producer supplied by the application
///
/// # Example
///
/// ```no_run
/// use rust_event_logger::core::{BrokerClient, DeliveryPolicy, Result};
/// use async_trait::async_trait;
///
/// struct StdoutBroker;
///
/// #[async_trait]
/// impl BrokerClient for StdoutBroker {
///     async fn publish(
///         &self,
///         topic: &str,
///         key: &[u8],
///         value: &[u8],
///         _policy: &DeliveryPolicy,
///     ) -> Result<()> {
///         println!("{} {:?} {}", topic, key, String::from_utf8_lossy(value));
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "stdout_broker"
///     }
/// }
/// ```
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Publish one message
    async fn publish(
        &self,
        topic: &str,
        key: &[u8],
        value: &[u8],
        policy: &DeliveryPolicy,
    ) -> Result<()>;

    /// Wait for in-flight messages
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Get the client name
    fn name(&self) -> &str;
}

//! Core logger types and traits

pub mod appender;
pub mod broker;
pub mod broker_client;
pub mod enriched_record;
pub mod enricher;
pub mod error;
pub mod key_deriver;
pub mod log_context;
pub mod log_level;
pub mod log_record;
pub mod logger;
pub mod metrics;
pub mod output_format;
pub mod router;

pub use appender::Appender;
pub use broker::{BrokerError, BrokerSink, Publish, DEFAULT_SHUTDOWN_TIMEOUT};
pub use broker_client::{BrokerClient, DeliveryPolicy};
pub use enriched_record::{EnrichedRecord, Event};
pub use enricher::{EventEnricher, IdCallback};
pub use error::{LoggerError, Result};
pub use key_deriver::KeyDeriver;
pub use log_context::{FieldValue, LogContext};
pub use log_level::LogLevel;
pub use log_record::LogRecord;
pub use logger::{FieldLogger, Logger, LoggerBuilder};
pub use metrics::{LoggerMetrics, MetricsSnapshot};
pub use output_format::EncodeOptions;
pub use router::{Destination, SinkDescriptor, SinkRouter};

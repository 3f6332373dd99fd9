//! # Rust Event Logger
//!
//! A structured logging facade. Each log call becomes a record that is
//! optionally enriched into an event envelope and fanned out to every
//! configured sink.
//!
//! ## Features
//!
//! - **Event Envelopes**: identifier, source, spec version, type and subject
//!   added to each record (`hmac`, `uuid`, `increment` or caller-supplied ids)
//! - **Multiple Sinks**: console, plain or rotating file, message broker, and
//!   custom [`Appender`]s, each with its own level and format
//! - **Fire-and-Forget Broker Path**: publishing never blocks the caller;
//!   failures are reported out of band
//! - **Layered Configuration**: defaults, TOML file and environment merged
//!   per sub-config with fatal/recoverable failure classification
//!
//! ## Example
//!
//! ```
//! use rust_event_logger::prelude::*;
//!
//! let config = LoggerConfig {
//!     enable_console: true,
//!     enable_file: false,
//!     console_target: ConsoleTarget::Stderr,
//!     ..Default::default()
//! };
//! let logger = Logger::builder().config(config).build()?;
//!
//! logger.info("service started");
//! logger.log_with_fields(
//!     LogLevel::Warn,
//!     "slow request",
//!     LogContext::new().with_field("elapsed_ms", 1250),
//! );
//! # Ok::<(), LoggerError>(())
//! ```

pub mod appenders;
pub mod config;
pub mod core;
pub mod global;
pub mod macros;

pub mod prelude {
    pub use crate::appenders::{ConsoleAppender, FileAppender, RotatingFileAppender};
    pub use crate::config::{
        ConfigResolver, ConsoleTarget, EnrichmentConfig, IdStrategy, KeyStrategy, LoggerConfig,
        OutputFormat, ProducerConfig, ResolveMode, RotationConfig,
    };
    pub use crate::core::{
        Appender, BrokerClient, DeliveryPolicy, EnrichedRecord, Event, FieldLogger, FieldValue,
        LogContext, LogLevel, LogRecord, Logger, LoggerBuilder, LoggerError, LoggerMetrics,
        Result, SinkDescriptor, DEFAULT_SHUTDOWN_TIMEOUT,
    };
}

pub use appenders::{ConsoleAppender, FileAppender, RotatingFileAppender, RotationPolicy};
pub use config::{ConfigResolver, LoggerConfig, Resolution, ResolveError, ResolveMode};
pub use core::{
    Appender, BrokerClient, BrokerError, DeliveryPolicy, EnrichedRecord, Event, EventEnricher,
    FieldLogger, FieldValue, KeyDeriver, LogContext, LogLevel, LogRecord, Logger, LoggerBuilder,
    LoggerError, LoggerMetrics, MetricsSnapshot, Result, SinkDescriptor, SinkRouter,
    DEFAULT_SHUTDOWN_TIMEOUT,
};

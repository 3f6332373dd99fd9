//! Main logger implementation

use super::{
    appender::Appender,
    broker::{BrokerError, BrokerSink, DEFAULT_SHUTDOWN_TIMEOUT},
    broker_client::BrokerClient,
    enriched_record::Event,
    enricher::{EventEnricher, IdCallback},
    error::{LoggerError, Result},
    log_context::{FieldValue, LogContext},
    log_level::LogLevel,
    log_record::LogRecord,
    metrics::LoggerMetrics,
    output_format::EncodeOptions,
    router::{Destination, SinkDescriptor, SinkRouter},
};
use crate::appenders::{ConsoleAppender, FileAppender, RotatingFileAppender};
use crate::config::{LogBackend, LoggerConfig};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::Duration;

/// One configured logging pipeline.
///
/// Built once through [`LoggerBuilder`]; its configuration and sinks never
/// change afterwards. `Logger` is `Send + Sync` and is meant to be shared
/// (usually behind an `Arc`) by every thread that logs.
pub struct Logger {
    config: Arc<LoggerConfig>,
    enricher: Option<EventEnricher>,
    router: SinkRouter,
    metrics: Arc<LoggerMetrics>,
    broker_errors: Option<Receiver<BrokerError>>,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.log_record(LogRecord::new(level, message));
    }

    /// Log with structured context fields
    pub fn log_with_fields(&self, level: LogLevel, message: impl Into<String>, fields: LogContext) {
        self.log_record(LogRecord::new(level, message).with_fields(fields));
    }

    /// Enrich (when enabled) and route one record.
    ///
    /// Nothing is enriched when no sink would accept the level. If
    /// enrichment fails the record is still delivered, un-enriched.
    pub fn log_record(&self, record: LogRecord) {
        if !self.router.accepts(record.level) {
            return;
        }

        let event = match &self.enricher {
            Some(enricher) => match enricher.enrich(&record) {
                Ok(enriched) => Event::Enriched(enriched),
                Err(e) => {
                    let previous = self.metrics.record_enrichment_fallback();
                    eprintln!(
                        "[LOGGER WARNING] {}; sending record without envelope ({} so far)",
                        e,
                        previous + 1
                    );
                    Event::Plain(record)
                }
            },
            None => Event::Plain(record),
        };

        self.router.route(&event);
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Highest severity; only a level, the process keeps running
    #[inline]
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }

    /// Child logger that adds `fields` to every record it logs
    ///
    /// # Example
    ///
    /// ```
    /// use rust_event_logger::prelude::*;
    ///
    /// let config = LoggerConfig {
    ///     enable_file: false,
    ///     ..Default::default()
    /// };
    /// let logger = Logger::builder().config(config).build().unwrap();
    ///
    /// let request = logger.with_fields(LogContext::new().with_field("request_id", "r-42"));
    /// request.info("accepted");
    /// ```
    pub fn with_fields(&self, fields: LogContext) -> FieldLogger<'_> {
        FieldLogger {
            logger: self,
            fields,
        }
    }

    /// Flush every sink, waiting up to [`DEFAULT_SHUTDOWN_TIMEOUT`] for the broker
    pub fn flush(&self) -> Result<()> {
        self.flush_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    pub fn flush_timeout(&self, timeout: Duration) -> Result<()> {
        self.router.flush(timeout)
    }

    /// Get the logger metrics for detailed observability
    ///
    /// # Example
    ///
    /// ```
    /// use rust_event_logger::prelude::*;
    ///
    /// let config = LoggerConfig {
    ///     enable_file: false,
    ///     ..Default::default()
    /// };
    /// let logger = Logger::builder().config(config).build().unwrap();
    ///
    /// let metrics = logger.metrics();
    /// println!("Routed: {}", metrics.records_routed());
    /// println!("Sink failures: {}", metrics.sink_failures());
    /// println!("Broker drop rate: {:.2}%", metrics.broker_drop_rate());
    /// ```
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// Out-of-band publish failures; `None` when the broker sink is disabled
    pub fn broker_errors(&self) -> Option<&Receiver<BrokerError>> {
        self.broker_errors.as_ref()
    }

    pub fn config(&self) -> &Arc<LoggerConfig> {
        &self.config
    }

    pub fn enricher(&self) -> Option<&EventEnricher> {
        self.enricher.as_ref()
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.router.sinks().iter().map(|s| s.name.as_str()).collect()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("config", &self.config)
            .field("enricher", &self.enricher)
            .field("sinks", &self.sink_names())
            .finish_non_exhaustive()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if let Err(e) = self.router.flush(DEFAULT_SHUTDOWN_TIMEOUT) {
            eprintln!("[LOGGER ERROR] Failed to flush during shutdown: {}", e);
        }

        let failures = self.metrics.sink_failures();
        let dropped = self.metrics.broker_dropped();
        if failures > 0 || dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Logger shutting down with {} sink failure(s) and {} dropped broker message(s) (drop rate: {:.2}%)",
                failures,
                dropped,
                self.metrics.broker_drop_rate()
            );
        }
    }
}

/// Logger view carrying a fixed set of fields
///
/// Per-call fields win over the carried ones.
pub struct FieldLogger<'a> {
    logger: &'a Logger,
    fields: LogContext,
}

impl FieldLogger<'_> {
    pub fn fields(&self) -> &LogContext {
        &self.fields
    }

    /// Extend the carried fields
    #[must_use = "builder methods return a new value"]
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.add_field(key, value);
        self
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.logger
            .log_record(LogRecord::new(level, message).with_fields(self.fields.clone()));
    }

    pub fn log_with_fields(&self, level: LogLevel, message: impl Into<String>, fields: LogContext) {
        let mut merged = self.fields.clone();
        merged.merge(&fields);
        self.logger
            .log_record(LogRecord::new(level, message).with_fields(merged));
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.log(LogLevel::Fatal, message);
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use rust_event_logger::prelude::*;
///
/// let config = LoggerConfig {
///     enable_console: true,
///     enable_file: false,
///     console_target: ConsoleTarget::Stderr,
///     ..Default::default()
/// };
///
/// let logger = Logger::builder().config(config).build().unwrap();
/// logger.info("ready");
/// ```
pub struct LoggerBuilder {
    config: LoggerConfig,
    broker_client: Option<Arc<dyn BrokerClient>>,
    id_generator: Option<IdCallback>,
    sinks: Vec<SinkDescriptor>,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
            broker_client: None,
            id_generator: None,
            sinks: Vec::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Client used by the broker sink; required when `enable_broker` is set
    #[must_use = "builder methods return a new value"]
    pub fn broker_client(mut self, client: Arc<dyn BrokerClient>) -> Self {
        self.broker_client = Some(client);
        self
    }

    /// Identifier callback for the `function` strategy
    #[must_use = "builder methods return a new value"]
    pub fn id_generator(mut self, generator: IdCallback) -> Self {
        self.id_generator = Some(generator);
        self
    }

    /// Add a caller-supplied sink after the configured ones
    #[must_use = "builder methods return a new value"]
    pub fn sink(mut self, sink: SinkDescriptor) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Validate the configuration and assemble every enabled sink.
    ///
    /// # Errors
    ///
    /// Any fatal configuration problem, including an enabled broker sink
    /// without a client, returns an error and no logger.
    pub fn build(self) -> Result<Logger> {
        let config = self.config;
        config.validate()?;

        let metrics = Arc::new(LoggerMetrics::new());
        let enricher = if config.enable_enrichment {
            Some(EventEnricher::new(&config.enrichment, self.id_generator)?)
        } else {
            None
        };

        let options = EncodeOptions {
            timestamps: config.enable_timestamps,
            color_levels: false,
        };
        let mut sinks = Vec::with_capacity(self.sinks.len() + 3);
        let mut broker_errors = None;

        if config.enable_console {
            let console_options = EncodeOptions {
                color_levels: config.enable_color_levels,
                ..options
            };
            let sink = match config.backend {
                LogBackend::Native => SinkDescriptor::writer(
                    config.console_format,
                    config.console_min_level(),
                    ConsoleAppender::with_target(config.console_target),
                )
                .with_options(console_options),
                LogBackend::Facade => facade_sink(&config, options)?,
            };
            sinks.push(sink);
        }

        if config.enable_file {
            let appender: Box<dyn Appender> = if config.enable_rotation {
                Box::new(RotatingFileAppender::new(&config.file_location, &config.rotation)?)
            } else {
                Box::new(FileAppender::new(&config.file_location)?)
            };
            sinks.push(SinkDescriptor {
                name: appender.name().to_string(),
                format: config.file_format,
                min_level: config.file_min_level(),
                options,
                destination: Destination::Writer(appender),
            });
        }

        if config.enable_broker {
            let client = self.broker_client.ok_or_else(|| {
                LoggerError::config(
                    LoggerConfig::COMPONENT,
                    "enable_broker is true but no broker client was supplied",
                )
            })?;
            let broker = BrokerSink::new(&config.producer, client, Arc::clone(&metrics))?;
            broker_errors = Some(broker.errors());
            sinks.push(
                SinkDescriptor::broker(config.broker_format, config.broker_min_level(), broker)
                    .with_options(options),
            );
        }

        sinks.extend(self.sinks);

        Ok(Logger {
            config: Arc::new(config),
            enricher,
            router: SinkRouter::new(sinks, Arc::clone(&metrics)),
            metrics,
            broker_errors,
        })
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "log-facade")]
fn facade_sink(config: &LoggerConfig, options: EncodeOptions) -> Result<SinkDescriptor> {
    Ok(SinkDescriptor::writer(
        config.console_format,
        config.console_min_level(),
        crate::appenders::FacadeAppender::new(),
    )
    .with_options(options))
}

#[cfg(not(feature = "log-facade"))]
fn facade_sink(_config: &LoggerConfig, _options: EncodeOptions) -> Result<SinkDescriptor> {
    Err(LoggerError::config(
        LoggerConfig::COMPONENT,
        "backend 'facade' requires the log-facade feature",
    ))
}

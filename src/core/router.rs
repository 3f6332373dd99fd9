//! Fan-out of one event to every configured sink

use super::appender::Appender;
use super::broker::{BrokerSink, Publish};
use super::enriched_record::Event;
use super::error::{LoggerError, Result};
use super::log_level::LogLevel;
use super::metrics::LoggerMetrics;
use super::output_format::EncodeOptions;
use crate::config::OutputFormat;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Where a sink's encoded lines go
pub enum Destination {
    Writer(Box<dyn Appender>),
    Broker(BrokerSink),
}

/// One sink: its level threshold, its encoding and its destination
pub struct SinkDescriptor {
    pub name: String,
    pub format: OutputFormat,
    pub min_level: LogLevel,
    pub options: EncodeOptions,
    pub destination: Destination,
}

impl SinkDescriptor {
    pub fn writer(
        format: OutputFormat,
        min_level: LogLevel,
        appender: impl Appender + 'static,
    ) -> Self {
        Self {
            name: appender.name().to_string(),
            format,
            min_level,
            options: EncodeOptions::default(),
            destination: Destination::Writer(Box::new(appender)),
        }
    }

    pub fn broker(format: OutputFormat, min_level: LogLevel, sink: BrokerSink) -> Self {
        Self {
            name: format!("broker:{}", sink.topic()),
            format,
            min_level,
            options: EncodeOptions::default(),
            destination: Destination::Broker(sink),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_options(mut self, options: EncodeOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn deliver(&self, event: &Event) -> Result<Publish> {
        let line = self.format.encode(event, &self.options)?;
        match &self.destination {
            Destination::Writer(appender) => {
                appender.append(&line, event.level()).map(|()| Publish::Queued)
            }
            Destination::Broker(broker) => broker.publish(event.record(), &line),
        }
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        match &self.destination {
            Destination::Writer(appender) => appender.flush(),
            Destination::Broker(broker) => broker.flush(timeout),
        }
    }
}

/// Immutable after construction, so routing needs no lock of its own
pub struct SinkRouter {
    sinks: Vec<SinkDescriptor>,
    metrics: Arc<LoggerMetrics>,
}

impl SinkRouter {
    pub fn new(sinks: Vec<SinkDescriptor>, metrics: Arc<LoggerMetrics>) -> Self {
        Self { sinks, metrics }
    }

    pub fn sinks(&self) -> &[SinkDescriptor] {
        &self.sinks
    }

    /// Would any sink take a record at `level`?
    pub fn accepts(&self, level: LogLevel) -> bool {
        self.sinks.iter().any(|sink| level >= sink.min_level)
    }

    /// Deliver to every sink whose threshold the event meets.
    ///
    /// **Per-Sink Isolation**: each delivery runs under `catch_unwind`; a
    /// failing or panicking sink is counted and reported, the others still
    /// receive the event. A record the broker sink abandoned was already
    /// counted and reported there.
    pub fn route(&self, event: &Event) {
        self.metrics.record_routed();
        let level = event.level();

        for (idx, sink) in self.sinks.iter().enumerate() {
            if level < sink.min_level {
                self.metrics.record_filtered();
                continue;
            }

            let outcome = catch_unwind(AssertUnwindSafe(|| sink.deliver(event)));
            match outcome {
                Ok(Ok(Publish::Queued)) => {
                    self.metrics.record_delivery();
                }
                Ok(Ok(Publish::Abandoned)) => {}
                Ok(Err(e)) => {
                    self.metrics.record_sink_failure();
                    eprintln!("[LOGGER ERROR] Sink #{} '{}' failed: {}", idx, sink.name, e);
                }
                Err(panic_err) => {
                    self.metrics.record_sink_failure();
                    eprintln!(
                        "[LOGGER CRITICAL] Sink #{} '{}' panicked: {:?}. \
                         Other sinks continue to function.",
                        idx, sink.name, panic_err
                    );
                }
            }
        }
    }

    /// Flush every sink; keeps going past failures and returns the first
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        let mut first_error = None;

        for (idx, sink) in self.sinks.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| sink.flush(timeout)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => {
                    eprintln!("[LOGGER ERROR] Sink #{} '{}' flush failed: {}", idx, sink.name, e);
                    e
                }
                Err(panic_err) => {
                    eprintln!(
                        "[LOGGER CRITICAL] Sink #{} '{}' panicked during flush: {:?}",
                        idx, sink.name, panic_err
                    );
                    LoggerError::writer(format!("sink '{}' panicked during flush", sink.name))
                }
            };
            self.metrics.record_sink_failure();
            first_error.get_or_insert(error);
        }

        first_error.map_or(Ok(()), Err)
    }
}

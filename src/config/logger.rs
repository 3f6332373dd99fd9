//! Top-level logger settings

use super::enrichment::EnrichmentConfig;
use super::producer::ProducerConfig;
use super::rotation::RotationConfig;
use super::validate::{Binder, Diagnostics};
use super::values::{ConsoleTarget, LogBackend, OutputFormat};
use crate::core::error::Result;
use crate::core::log_level::LogLevel;
use std::path::PathBuf;

pub const DEFAULT_FILE_LOCATION: &str = "event.log";

/// Complete configuration of one logger instance.
///
/// Resolved once, then shared read-only behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub backend: LogBackend,
    /// Default minimum level for every sink
    pub level: LogLevel,
    pub enable_timestamps: bool,
    pub enable_color_levels: bool,
    pub enable_enrichment: bool,

    pub enable_broker: bool,
    pub broker_format: OutputFormat,
    pub broker_level: Option<LogLevel>,

    pub enable_console: bool,
    pub console_format: OutputFormat,
    pub console_target: ConsoleTarget,
    pub console_level: Option<LogLevel>,

    pub enable_file: bool,
    pub file_format: OutputFormat,
    pub file_location: PathBuf,
    pub file_level: Option<LogLevel>,
    pub enable_rotation: bool,

    pub producer: ProducerConfig,
    pub enrichment: EnrichmentConfig,
    pub rotation: RotationConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            backend: LogBackend::Native,
            level: LogLevel::Info,
            enable_timestamps: true,
            enable_color_levels: true,
            enable_enrichment: true,
            enable_broker: false,
            broker_format: OutputFormat::Enriched,
            broker_level: None,
            enable_console: false,
            console_format: OutputFormat::Text,
            console_target: ConsoleTarget::Stdout,
            console_level: None,
            enable_file: true,
            file_format: OutputFormat::Json,
            file_location: PathBuf::from(DEFAULT_FILE_LOCATION),
            file_level: None,
            enable_rotation: false,
            producer: ProducerConfig::default(),
            enrichment: EnrichmentConfig::default(),
            rotation: RotationConfig::default(),
        }
    }
}

impl LoggerConfig {
    pub const COMPONENT: &'static str = "logger";

    /// Merge one layer of logger-level keys; sub-configs are resolved separately
    pub fn apply_layer(&mut self, binder: &mut Binder<'_>) {
        binder.parse("backend", &mut self.backend);
        binder.parse("level", &mut self.level);
        binder.bool("enable_timestamps", &mut self.enable_timestamps);
        binder.bool("enable_color_levels", &mut self.enable_color_levels);
        binder.bool("enable_enrichment", &mut self.enable_enrichment);

        binder.bool("enable_broker", &mut self.enable_broker);
        binder.parse("broker_format", &mut self.broker_format);
        binder.parse_opt("broker_level", &mut self.broker_level);

        binder.bool("enable_console", &mut self.enable_console);
        binder.parse("console_format", &mut self.console_format);
        binder.parse("console_target", &mut self.console_target);
        binder.parse_opt("console_level", &mut self.console_level);

        binder.bool("enable_file", &mut self.enable_file);
        binder.parse("file_format", &mut self.file_format);
        binder.path("file_location", &mut self.file_location);
        binder.parse_opt("file_level", &mut self.file_level);
        binder.bool("enable_rotation", &mut self.enable_rotation);
    }

    /// Cross-field rules of the logger itself
    pub fn check(&self, diagnostics: &mut Diagnostics) {
        let c = Self::COMPONENT;

        if !self.enable_enrichment {
            let sinks = [
                (self.enable_broker, "broker_format", self.broker_format),
                (self.enable_console, "console_format", self.console_format),
                (self.enable_file, "file_format", self.file_format),
            ];
            for (enabled, field, format) in sinks {
                if enabled && format == OutputFormat::Enriched {
                    diagnostics.reject(c, field, format.as_str(), "requires enable_enrichment");
                }
            }
        }

        if self.enable_file && self.file_location.as_os_str().is_empty() {
            diagnostics.reject(c, "file_location", "", "required when enable_file is true");
        }

        if self.backend == LogBackend::Facade && !cfg!(feature = "log-facade") {
            diagnostics.reject(
                c,
                "backend",
                self.backend.as_str(),
                "crate built without the log-facade feature",
            );
        }
    }

    /// Effective minimum level of each sink
    pub fn broker_min_level(&self) -> LogLevel {
        self.broker_level.unwrap_or(self.level)
    }

    pub fn console_min_level(&self) -> LogLevel {
        self.console_level.unwrap_or(self.level)
    }

    pub fn file_min_level(&self) -> LogLevel {
        self.file_level.unwrap_or(self.level)
    }

    /// Check a programmatically built config the way the resolver would
    /// with every enabled feature treated as fatal
    pub fn validate(&self) -> Result<()> {
        let mut diagnostics = Diagnostics::new();
        self.check(&mut diagnostics);
        if self.enable_enrichment {
            self.enrichment.check(&mut diagnostics);
        }
        if self.enable_broker {
            self.producer.check(&mut diagnostics);
            self.producer.check_id_strategy(&self.enrichment, &mut diagnostics);
        }
        if self.enable_file && self.enable_rotation {
            self.rotation.check(&mut diagnostics);
        }
        diagnostics.into_result(Self::COMPONENT)
    }
}

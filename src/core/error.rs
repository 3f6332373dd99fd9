//! Error types for the logger system

use crate::config::{Diagnostic, ResolveError};
use std::time::Duration;

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Aggregated validation failure with one diagnostic per offending field
    #[error(
        "Invalid {component} configuration ({} error(s)): {}",
        .diagnostics.len(),
        join_diagnostics(.diagnostics)
    )]
    Validation {
        component: String,
        diagnostics: Vec<Diagnostic>,
    },

    /// Configuration file exists but is unusable
    #[error("Config file '{path}': {message}")]
    ConfigFile { path: String, message: String },

    /// Configuration file not found in any search location
    #[error("Config file '{name}' not found (searched: {searched})")]
    ConfigFileNotFound { name: String, searched: String },

    /// Layered configuration resolution failed
    #[error(transparent)]
    Resolution(Box<ResolveError>),

    /// Extracted key field is absent or not a string
    #[error("Field '{field}' unusable as key: {reason}")]
    MissingField { field: String, reason: String },

    /// Identifier generation or envelope construction failed
    #[error("Enrichment failed: {0}")]
    Enrichment(String),

    /// Queue full with buffer details
    #[error("Log queue full: {current}/{max} messages buffered")]
    QueueFull { current: usize, max: usize },

    /// Logger already stopped
    #[error("Logger already stopped")]
    LoggerStopped,

    /// File appender error with path
    #[error("File appender error for '{path}': {message}")]
    FileAppenderError { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Formatter error with format type
    #[error("Formatter error ({format_type}): {message}")]
    FormatterError {
        format_type: String,
        message: String,
    },

    /// Broker client rejected or failed a publish
    #[error("Broker publish to '{topic}' failed: {message}")]
    BrokerPublish { topic: String, message: String },

    /// Flush did not complete in time
    #[error("Flush did not complete within {timeout:?}")]
    FlushTimeout { timeout: Duration },

    /// Channel send error
    #[error("Failed to send log entry to async worker")]
    ChannelSendError,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ResolveError> for LoggerError {
    fn from(err: ResolveError) -> Self {
        LoggerError::Resolution(Box::new(err))
    }
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a queue full error with buffer details
    pub fn queue_full(current: usize, max: usize) -> Self {
        LoggerError::QueueFull { current, max }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an aggregated validation error
    pub fn validation(component: impl Into<String>, diagnostics: Vec<Diagnostic>) -> Self {
        LoggerError::Validation {
            component: component.into(),
            diagnostics,
        }
    }

    /// Create a config file error
    pub fn config_file(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::ConfigFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a missing/mistyped key field error
    pub fn missing_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        LoggerError::MissingField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn enrichment<S: Into<String>>(msg: S) -> Self {
        LoggerError::Enrichment(msg.into())
    }

    /// Create a file appender error
    pub fn file_appender(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileAppenderError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a formatter error
    pub fn formatter(format_type: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FormatterError {
            format_type: format_type.into(),
            message: message.into(),
        }
    }

    /// Create a broker publish error
    pub fn broker(topic: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::BrokerPublish {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// Diagnostics carried by a validation failure, possibly nested in a resolution error
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            LoggerError::Validation { diagnostics, .. } => diagnostics,
            LoggerError::Resolution(err) => err.source.diagnostics(),
            _ => &[],
        }
    }
}

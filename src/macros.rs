//! Logging macros for ergonomic log message formatting.
//!
//! These macros provide a convenient interface for logging with automatic
//! string formatting, similar to `println!` and `format!`.
//!
//! # Examples
//!
//! ```
//! use rust_event_logger::prelude::*;
//! use rust_event_logger::{fields, info};
//!
//! let config = LoggerConfig { enable_file: false, ..Default::default() };
//! let logger = Logger::builder().config(config).build().unwrap();
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! // With structured fields
//! info!(logger, fields!("user_id" => 42, "action" => "login"); "User {} logged in", 42);
//! ```

/// Build a [`LogContext`](crate::LogContext) from `key => value` pairs.
///
/// ```
/// use rust_event_logger::{fields, FieldValue};
///
/// let ctx = fields!("user_id" => 7, "admin" => false);
/// assert_eq!(ctx.get("user_id"), Some(&FieldValue::Int(7)));
/// assert_eq!(ctx.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::LogContext::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::LogContext::new()$(.with_field($key, $value))+
    };
}

/// Log a message with automatic formatting.
///
/// # Examples
///
/// ```
/// # use rust_event_logger::prelude::*;
/// # let logger = Logger::builder().config(LoggerConfig { enable_file: false, ..Default::default() }).build().unwrap();
/// use rust_event_logger::{fields, log};
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// log!(logger, LogLevel::Warn, fields!("attempt" => 3); "Retrying");
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $fields:expr; $($arg:tt)+) => {
        $logger.log_with_fields($level, format!($($arg)+), $fields)
    };
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format!($($arg)+))
    };
}

/// Log a debug-level message.
///
/// # Examples
///
/// ```
/// # use rust_event_logger::prelude::*;
/// # let logger = Logger::builder().config(LoggerConfig { enable_file: false, ..Default::default() }).build().unwrap();
/// use rust_event_logger::debug;
/// debug!(logger, "Debug information");
/// debug!(logger, "Counter value: {}", 10);
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use rust_event_logger::prelude::*;
/// # let logger = Logger::builder().config(LoggerConfig { enable_file: false, ..Default::default() }).build().unwrap();
/// use rust_event_logger::{error, fields};
/// error!(logger, "Failed to connect to database");
/// error!(logger, fields!("code" => 500); "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message. The process keeps running.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}

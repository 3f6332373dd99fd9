//! Appender trait for log output destinations

use super::{error::Result, log_level::LogLevel};

/// A writer sink: receives lines already encoded for it.
///
/// Implementations serialize concurrent callers internally.
pub trait Appender: Send + Sync {
    fn append(&self, line: &str, level: LogLevel) -> Result<()>;
    fn flush(&self) -> Result<()>;
    fn name(&self) -> &str;
}

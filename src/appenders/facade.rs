//! Appender that hands encoded lines to the `log` crate facade
//!
//! Used for the console sink when the backend is `facade`, so an
//! application that already installed a `log` implementation keeps a
//! single output pipeline.

use crate::core::{Appender, LogLevel, Result};

pub const DEFAULT_TARGET: &str = "rust_event_logger";

pub struct FacadeAppender {
    target: String,
}

impl FacadeAppender {
    pub fn new() -> Self {
        Self::with_target(DEFAULT_TARGET)
    }

    pub fn with_target(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Default for FacadeAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for FacadeAppender {
    fn append(&self, line: &str, level: LogLevel) -> Result<()> {
        log::log!(target: &self.target, level.into(), "{}", line);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        log::logger().flush();
        Ok(())
    }

    fn name(&self) -> &str {
        "facade"
    }
}

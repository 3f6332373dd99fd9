//! Appender implementations

pub mod console;
pub mod file;
pub mod rotating_file;

#[cfg(feature = "log-facade")]
pub mod facade;

pub use console::ConsoleAppender;
pub use file::FileAppender;
pub use rotating_file::{RotatingFileAppender, RotationPolicy};

#[cfg(feature = "log-facade")]
pub use facade::FacadeAppender;

pub use crate::core::Appender;

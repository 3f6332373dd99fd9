//! Process-wide default logger
//!
//! Nothing here owns configuration: an application builds a [`Logger`]
//! and installs it once with [`set_default`]. The free functions then
//! delegate to that instance.

use crate::config::{ConfigResolver, AUTOCFG_ENV, AUTOINIT_ENV, CFGFILE_ENV, DEFAULT_CONFIG_FILE};
use crate::core::{BrokerClient, LogContext, LogLevel, Logger, LoggerError, Result};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

static DEFAULT_LOGGER: OnceLock<Arc<Logger>> = OnceLock::new();

/// Install the default logger; only the first call succeeds
pub fn set_default(logger: Arc<Logger>) -> Result<()> {
    DEFAULT_LOGGER
        .set(logger)
        .map_err(|_| LoggerError::config("global", "default logger already set"))
}

pub fn default_logger() -> Option<Arc<Logger>> {
    DEFAULT_LOGGER.get().cloned()
}

fn with_default(f: impl FnOnce(&Logger)) {
    match DEFAULT_LOGGER.get() {
        Some(logger) => f(logger),
        None => eprintln!("[LOGGER WARNING] default logger not initialized"),
    }
}

pub fn log(level: LogLevel, message: impl Into<String>) {
    with_default(|logger| logger.log(level, message));
}

pub fn log_with_fields(level: LogLevel, message: impl Into<String>, fields: LogContext) {
    with_default(|logger| logger.log_with_fields(level, message, fields));
}

pub fn debug(message: impl Into<String>) {
    log(LogLevel::Debug, message);
}

pub fn info(message: impl Into<String>) {
    log(LogLevel::Info, message);
}

pub fn warn(message: impl Into<String>) {
    log(LogLevel::Warn, message);
}

pub fn error(message: impl Into<String>) {
    log(LogLevel::Error, message);
}

pub fn fatal(message: impl Into<String>) {
    log(LogLevel::Fatal, message);
}

pub fn flush() -> Result<()> {
    match DEFAULT_LOGGER.get() {
        Some(logger) => logger.flush(),
        None => Err(LoggerError::other("default logger not initialized")),
    }
}

/// Build a logger the way [`init_from_env`] would, from explicit variables.
///
/// Returns `Ok(None)` unless `EVLOG_AUTOINIT` is exactly `true`. The mode
/// comes from `EVLOG_AUTOCFG` (default `env`), the file name from
/// `EVLOG_CFGFILE` (default `evlog_config`). Recoverable failures are
/// printed and the affected feature stays off.
pub fn logger_from_env_vars<I, K, V>(
    vars: I,
    broker: Option<Arc<dyn BrokerClient>>,
) -> Result<Option<Logger>>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let vars: HashMap<String, String> = vars
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();

    if vars.get(AUTOINIT_ENV).map(String::as_str) != Some("true") {
        return Ok(None);
    }

    let mode = vars
        .get(AUTOCFG_ENV)
        .filter(|m| !m.is_empty())
        .map_or("env", String::as_str);
    let file_name = vars
        .get(CFGFILE_ENV)
        .filter(|f| !f.is_empty())
        .map_or(DEFAULT_CONFIG_FILE, String::as_str);

    let resolution = ConfigResolver::from_mode_str(mode)?
        .with_file_name(file_name)
        .with_env_vars(vars.clone())
        .resolve()?;
    for failure in &resolution.recovered {
        eprintln!("[LOGGER CONFIG] {}", failure);
    }

    let mut builder = Logger::builder().config(resolution.config);
    if let Some(client) = broker {
        builder = builder.broker_client(client);
    }
    builder.build().map(Some)
}

/// Auto-initialize the default logger from the process environment.
///
/// `Ok(None)` means auto-init is off. A fatal configuration error installs
/// nothing.
pub fn init_from_env(broker: Option<Arc<dyn BrokerClient>>) -> Result<Option<Arc<Logger>>> {
    let Some(logger) = logger_from_env_vars(std::env::vars(), broker)? else {
        return Ok(None);
    };
    let logger = Arc::new(logger);
    set_default(Arc::clone(&logger))?;
    Ok(Some(logger))
}

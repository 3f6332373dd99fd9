//! Per-field diagnostics and the typed binder that merges one layer

use super::source::ConfigSource;
use crate::core::error::{LoggerError, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// One rejected configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub component: String,
    pub field: String,
    pub value: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        component: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            component: component.into(),
            field: field.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} = '{}': {}",
            self.component, self.field, self.value, self.message
        )
    }
}

/// Diagnostics collected while resolving or validating one component.
///
/// The error count is the number of entries.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn reject(
        &mut self,
        component: &str,
        field: &str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic::new(component, field, value, message));
    }

    pub fn error_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// `Ok` when nothing was rejected, otherwise one aggregated validation error
    pub fn into_result(self, component: &str) -> Result<()> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(LoggerError::validation(component, self.items))
        }
    }
}

/// Reads one layer's values for one component, parsing each before it is
/// merged. A value that fails to parse leaves the target untouched and
/// records a diagnostic.
pub struct Binder<'a> {
    component: &'static str,
    source: &'a dyn ConfigSource,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Binder<'a> {
    pub fn new(
        component: &'static str,
        source: &'a dyn ConfigSource,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            component,
            source,
            diagnostics,
        }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    fn reject(&mut self, key: &str, value: &str, message: impl Into<String>) {
        self.diagnostics.reject(self.component, key, value, message);
    }

    /// Closed-set values (enums, levels); empty input is rejected
    pub fn parse<T>(&mut self, key: &str, target: &mut T)
    where
        T: FromStr<Err = String>,
    {
        if let Some(parsed) = self.parse_value(key) {
            *target = parsed;
        }
    }

    pub fn parse_opt<T>(&mut self, key: &str, target: &mut Option<T>)
    where
        T: FromStr<Err = String>,
    {
        if let Some(parsed) = self.parse_value(key) {
            *target = Some(parsed);
        }
    }

    fn parse_value<T>(&mut self, key: &str) -> Option<T>
    where
        T: FromStr<Err = String>,
    {
        let raw = self.source.get(key)?;
        if raw.trim().is_empty() {
            self.reject(key, &raw, "must not be empty");
            return None;
        }
        match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(message) => {
                self.reject(key, &raw, message);
                None
            }
        }
    }

    pub fn string(&mut self, key: &str, target: &mut String) {
        if let Some(raw) = self.source.get(key) {
            *target = raw;
        }
    }

    pub fn bool(&mut self, key: &str, target: &mut bool) {
        let Some(raw) = self.source.get(key) else {
            return;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => *target = true,
            "false" | "0" => *target = false,
            _ => self.reject(key, &raw, "expected a boolean (true|false)"),
        }
    }

    /// Integer that must be zero or positive
    pub fn non_negative<T>(&mut self, key: &str, target: &mut T)
    where
        T: TryFrom<u64>,
    {
        if let Some(value) = self.non_negative_value(key) {
            match T::try_from(value) {
                Ok(value) => *target = value,
                Err(_) => self.reject(key, &value.to_string(), "value out of range"),
            }
        }
    }

    fn non_negative_value(&mut self, key: &str) -> Option<u64> {
        let raw = self.source.get(key)?;
        match raw.trim().parse::<i64>() {
            Ok(value) if value < 0 => {
                self.reject(key, &raw, "must not be negative");
                None
            }
            // i64 to u64 is lossless once the sign is known
            Ok(value) => Some(value as u64),
            Err(_) => {
                self.reject(key, &raw, "expected an integer");
                None
            }
        }
    }

    /// Non-negative millisecond count
    pub fn millis(&mut self, key: &str, target: &mut Duration) {
        if let Some(ms) = self.non_negative_value(key) {
            *target = Duration::from_millis(ms);
        }
    }

    /// Comma-separated list; blank entries are dropped
    pub fn list(&mut self, key: &str, target: &mut Vec<String>) {
        if let Some(raw) = self.source.get(key) {
            *target = raw
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(String::from)
                .collect();
        }
    }

    pub fn path(&mut self, key: &str, target: &mut PathBuf) {
        if let Some(raw) = self.source.get(key) {
            *target = PathBuf::from(raw.trim());
        }
    }

    pub fn path_opt(&mut self, key: &str, target: &mut Option<PathBuf>) {
        if let Some(raw) = self.source.get(key) {
            let raw = raw.trim();
            *target = (!raw.is_empty()).then(|| PathBuf::from(raw));
        }
    }
}

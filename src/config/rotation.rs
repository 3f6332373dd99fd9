//! Size and age policy for the rotating file writer

use super::validate::{Binder, Diagnostics};
use std::time::Duration;

pub const DEFAULT_MAX_SIZE_MB: u64 = 100;

const BYTES_PER_MB: u64 = 1024 * 1024;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationConfig {
    /// Rotate once the file reaches this size; 0 means the default
    pub max_size_mb: u64,
    /// Delete backups older than this; 0 keeps them forever
    pub max_age_days: u64,
    /// Number of backups to keep; 0 keeps all
    pub max_backups: usize,
    /// Name backups by local time instead of UTC
    pub local_time: bool,
    /// Gzip backups once rotated
    pub compress: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            max_age_days: 0,
            max_backups: 0,
            local_time: false,
            compress: false,
        }
    }
}

impl RotationConfig {
    pub const COMPONENT: &'static str = "rotation";

    pub fn apply_layer(&mut self, binder: &mut Binder<'_>) {
        binder.non_negative("max_size_mb", &mut self.max_size_mb);
        binder.non_negative("max_age_days", &mut self.max_age_days);
        binder.non_negative("max_backups", &mut self.max_backups);
        binder.bool("local_time", &mut self.local_time);
        binder.bool("compress", &mut self.compress);
    }

    pub fn check(&self, diagnostics: &mut Diagnostics) {
        if self.max_size_mb.checked_mul(BYTES_PER_MB).is_none() {
            diagnostics.reject(
                Self::COMPONENT,
                "max_size_mb",
                self.max_size_mb.to_string(),
                "size in bytes overflows",
            );
        }
        if self.max_age_days.checked_mul(SECONDS_PER_DAY).is_none() {
            diagnostics.reject(
                Self::COMPONENT,
                "max_age_days",
                self.max_age_days.to_string(),
                "age in seconds overflows",
            );
        }
    }

    pub fn max_size_bytes(&self) -> u64 {
        let mb = if self.max_size_mb == 0 {
            DEFAULT_MAX_SIZE_MB
        } else {
            self.max_size_mb
        };
        mb.saturating_mul(BYTES_PER_MB)
    }

    pub fn max_age(&self) -> Option<Duration> {
        (self.max_age_days > 0)
            .then(|| Duration::from_secs(self.max_age_days.saturating_mul(SECONDS_PER_DAY)))
    }

    pub fn max_backups(&self) -> Option<usize> {
        (self.max_backups > 0).then_some(self.max_backups)
    }
}

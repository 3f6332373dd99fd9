//! Rotating file appender with size-triggered rotation
//!
//! When the next line would push the active file past its size limit the
//! file is renamed to a timestamped backup (`event-2025-01-08T10-30-45.123.log`),
//! optionally gzipped, and a fresh file is opened. Old backups are pruned by
//! count and by age.

use super::file::open_append;
use crate::config::RotationConfig;
use crate::core::{Appender, LogLevel, LoggerError, Result};
use chrono::{Local, Utc};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";

/// Resolved rotation rules
///
/// # Examples
///
/// ```
/// use rust_event_logger::appenders::RotationPolicy;
/// use std::time::Duration;
///
/// let policy = RotationPolicy::new()
///     .with_max_bytes(10 * 1024 * 1024)
///     .with_max_backups(5)
///     .with_max_age(Duration::from_secs(7 * 86_400))
///     .with_compression(true);
/// assert_eq!(policy.max_backups, Some(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_bytes: u64,
    /// `None` keeps every backup
    pub max_backups: Option<usize>,
    /// `None` never expires backups
    pub max_age: Option<Duration>,
    pub local_time: bool,
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::from_config(&RotationConfig::default())
    }
}

impl RotationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &RotationConfig) -> Self {
        Self {
            max_bytes: config.max_size_bytes(),
            max_backups: config.max_backups(),
            max_age: config.max_age(),
            local_time: config.local_time,
            compress: config.compress,
        }
    }

    #[must_use]
    pub fn with_max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = bytes.max(1);
        self
    }

    #[must_use]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = (count > 0).then_some(count);
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = (!age.is_zero()).then_some(age);
        self
    }

    #[must_use]
    pub fn with_local_time(mut self, enabled: bool) -> Self {
        self.local_time = enabled;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

struct ActiveFile {
    writer: Option<BufWriter<File>>,
    size: u64,
}

/// All state sits behind one mutex so rotation never interleaves with writes
pub struct RotatingFileAppender {
    base_path: PathBuf,
    policy: RotationPolicy,
    active: Mutex<ActiveFile>,
}

impl RotatingFileAppender {
    pub fn new<P: AsRef<Path>>(path: P, config: &RotationConfig) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::from_config(config))
    }

    /// Create a new rotating file appender with custom policy
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be created or opened
    pub fn with_policy<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        let file = open_append(&base_path)?;
        let size = file
            .metadata()
            .map_err(|e| {
                LoggerError::file_appender(
                    base_path.display().to_string(),
                    format!("Cannot access file metadata: {}", e),
                )
            })?
            .len();

        Ok(Self {
            base_path,
            policy,
            active: Mutex::new(ActiveFile {
                writer: Some(BufWriter::new(file)),
                size,
            }),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.active.lock().size
    }

    /// Rotate now regardless of size
    pub fn rotate(&self) -> Result<()> {
        let mut active = self.active.lock();
        self.rotate_locked(&mut active)
    }

    fn rotate_locked(&self, active: &mut ActiveFile) -> Result<()> {
        // Release the handle before the rename
        if let Some(mut writer) = active.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        if self.base_path.exists() {
            let backup = self.next_backup_path();
            fs::rename(&self.base_path, &backup).map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to rotate current log file: {}", e),
                )
            })?;

            if self.policy.compress {
                compress_file(&backup)?;
            }
        }

        active.writer = Some(BufWriter::new(open_append(&self.base_path)?));
        active.size = 0;

        self.prune_backups();
        Ok(())
    }

    /// `<stem>-<timestamp><ext>`, with a counter before the extension on collision
    fn next_backup_path(&self) -> PathBuf {
        let (stem, ext) = self.name_parts();
        let stamp = if self.policy.local_time {
            Local::now().format(BACKUP_TIME_FORMAT).to_string()
        } else {
            Utc::now().format(BACKUP_TIME_FORMAT).to_string()
        };

        let mut candidate = self.base_path.with_file_name(format!("{}-{}{}", stem, stamp, ext));
        let mut counter = 1;
        while candidate.exists() || gz_path(&candidate).exists() {
            candidate = self
                .base_path
                .with_file_name(format!("{}-{}-{}{}", stem, stamp, counter, ext));
            counter += 1;
        }
        candidate
    }

    fn name_parts(&self) -> (String, String) {
        let stem = self
            .base_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("event")
            .to_string();
        let ext = self
            .base_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        (stem, ext)
    }

    /// Existing backups of this file, newest first
    pub fn backups(&self) -> Vec<PathBuf> {
        let (stem, ext) = self.name_parts();
        let prefix = format!("{}-", stem);
        let gz_ext = format!("{}.gz", ext);
        let dir = match self.base_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };

        let mut backups: Vec<(SystemTime, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let Some(name) = name.to_str() else {
                    return false;
                };
                let Some(rest) = name.strip_prefix(&prefix) else {
                    return false;
                };
                let stamp = rest.strip_suffix(&gz_ext).or_else(|| rest.strip_suffix(&ext));
                stamp.is_some_and(is_backup_stamp)
            })
            .map(|entry| {
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, entry.path())
            })
            .collect();

        backups.sort_by(|a, b| b.cmp(a));
        backups.into_iter().map(|(_, path)| path).collect()
    }

    fn prune_backups(&self) {
        if self.policy.max_backups.is_none() && self.policy.max_age.is_none() {
            return;
        }

        let now = SystemTime::now();
        for (idx, path) in self.backups().into_iter().enumerate() {
            let over_count = self.policy.max_backups.is_some_and(|max| idx >= max);
            let expired = self.policy.max_age.is_some_and(|max_age| {
                fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok())
                    .is_some_and(|age| age > max_age)
            });

            if over_count || expired {
                if let Err(e) = fs::remove_file(&path) {
                    eprintln!(
                        "[LOGGER WARNING] Failed to remove old backup {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }
    }
}

/// `2025-01-08T10-30-45.123`, optionally followed by `-<counter>`
fn is_backup_stamp(stamp: &str) -> bool {
    const STAMP_LEN: usize = 23;
    if stamp.len() < STAMP_LEN || !stamp.is_char_boundary(STAMP_LEN) {
        return false;
    }
    let (time, counter) = stamp.split_at(STAMP_LEN);
    let counter_ok = counter.is_empty()
        || counter
            .strip_prefix('-')
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
    counter_ok && chrono::NaiveDateTime::parse_from_str(time, BACKUP_TIME_FORMAT).is_ok()
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

/// Gzip `path` next to itself, streaming through a temporary file.
///
/// The original is only removed once the compressed copy is complete.
fn compress_file(path: &Path) -> Result<()> {
    use std::io::{BufReader, Read};

    let gz = gz_path(path);
    let mut temp = gz.clone().into_os_string();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(64 * 1024, input);

    let output = File::create(&temp).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", temp.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );

    let mut buffer = vec![0u8; 64 * 1024];
    let streamed = loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err(e),
        };
        if let Err(e) = encoder.write_all(&buffer[..read]) {
            break Err(e);
        }
    };

    let finished = streamed
        .and_then(|()| encoder.finish())
        .and_then(|mut writer| writer.flush())
        .and_then(|()| fs::rename(&temp, &gz));
    if let Err(e) = finished {
        let _ = fs::remove_file(&temp);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compressed {} but failed to remove the original: {}",
            path.display(),
            e
        );
    }
    Ok(())
}

impl Appender for RotatingFileAppender {
    fn append(&self, line: &str, _level: LogLevel) -> Result<()> {
        let mut active = self.active.lock();
        let incoming = line.len() as u64 + 1;

        if active.size > 0 && active.size + incoming > self.policy.max_bytes {
            if let Err(e) = self.rotate_locked(&mut active) {
                eprintln!(
                    "[LOGGER WARNING] Log rotation failed: {}. Continuing with current file.",
                    e
                );
                if active.writer.is_none() {
                    active.writer = Some(BufWriter::new(open_append(&self.base_path)?));
                }
                // Let the file grow past the limit instead of retrying on every line
                active.size = 0;
            }
        }

        let writer = active
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("Writer not initialized"))?;
        writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(|e| {
                LoggerError::file_appender(
                    self.base_path.display().to_string(),
                    format!("Failed to write log entry: {}", e),
                )
            })?;
        active.size += incoming;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Some(writer) = self.active.lock().writer.as_mut() {
            writer.flush().map_err(|e| {
                LoggerError::file_appender(
                    self.base_path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "rotating_file"
    }
}

impl Drop for RotatingFileAppender {
    fn drop(&mut self) {
        if let Some(mut writer) = self.active.get_mut().writer.take() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    fn line(i: usize) -> String {
        format!("{{\"level\":\"info\",\"msg\":\"Test message number {:03}\"}}", i)
    }

    #[test]
    fn test_policy_from_config() {
        let config = RotationConfig {
            max_size_mb: 0,
            max_backups: 4,
            compress: true,
            ..Default::default()
        };
        let policy = RotationPolicy::from_config(&config);
        assert_eq!(policy.max_bytes, 100 * 1024 * 1024);
        assert_eq!(policy.max_backups, Some(4));
        assert_eq!(policy.max_age, None);
        assert!(policy.compress);
    }

    #[test]
    fn test_rotating_appender_creation() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("test.log");

        let appender = RotatingFileAppender::new(&log_path, &RotationConfig::default()).unwrap();
        assert_eq!(appender.path(), log_path);
        assert_eq!(appender.current_size(), 0);
        assert!(appender.backups().is_empty());
    }

    #[test]
    fn test_size_rotation_creates_timestamped_backups() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("rotation.log");
        let policy = RotationPolicy::new().with_max_bytes(200);
        let appender = RotatingFileAppender::with_policy(&log_path, policy).unwrap();

        for i in 0..20 {
            appender.append(&line(i), LogLevel::Info).unwrap();
        }
        appender.flush().unwrap();

        let backups = appender.backups();
        assert!(!backups.is_empty());
        for backup in &backups {
            let name = backup.file_name().unwrap().to_str().unwrap();
            assert!(name.starts_with("rotation-"));
            assert!(name.ends_with(".log"));
        }
        assert!(fs::metadata(&log_path).unwrap().len() <= 200);

        // Nothing written is lost across rotations
        let mut total = fs::read_to_string(&log_path).unwrap().lines().count();
        for backup in &backups {
            total += fs::read_to_string(backup).unwrap().lines().count();
        }
        assert_eq!(total, 20);
    }

    #[test]
    fn test_backups_are_pruned_to_max_count() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("pruned.log");
        let policy = RotationPolicy::new().with_max_bytes(64).with_max_backups(2);
        let appender = RotatingFileAppender::with_policy(&log_path, policy).unwrap();

        for i in 0..12 {
            appender.append(&line(i), LogLevel::Info).unwrap();
        }

        assert_eq!(appender.backups().len(), 2);
    }

    #[test]
    fn test_compressed_backups() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("zipped.log");
        let policy = RotationPolicy::new().with_compression(true);
        let appender = RotatingFileAppender::with_policy(&log_path, policy).unwrap();

        appender.append("before rotation", LogLevel::Info).unwrap();
        appender.rotate().unwrap();
        appender.append("after rotation", LogLevel::Info).unwrap();
        appender.flush().unwrap();

        let backups = appender.backups();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].to_str().unwrap().ends_with(".log.gz"));

        let mut decoded = String::new();
        flate2::read::GzDecoder::new(File::open(&backups[0]).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "before rotation\n");
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "after rotation\n");
    }

    #[test]
    fn test_backup_stamp_recognition() {
        assert!(is_backup_stamp("2025-01-08T10-30-45.123"));
        assert!(is_backup_stamp("2025-01-08T10-30-45.123-2"));
        assert!(!is_backup_stamp("2025-01-08T10-30-45.123-"));
        assert!(!is_backup_stamp("notes"));
    }
}

//! File appender implementation

use crate::core::{Appender, LogLevel, LoggerError, Result};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Opens `path` for appending, creating missing parent directories
pub(crate) fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            LoggerError::io_operation(
                "creating log directory",
                format!("cannot create '{}'", parent.display()),
                e,
            )
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            LoggerError::io_operation(
                "opening log file",
                format!("cannot open '{}'", path.display()),
                e,
            )
        })
}

pub struct FileAppender {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileAppender {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Appender for FileAppender {
    fn append(&self, line: &str, _level: LogLevel) -> Result<()> {
        let mut writer = self.writer.lock();
        writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(|e| LoggerError::file_appender(self.path.display().to_string(), e.to_string()))
    }

    fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileAppender {
    fn drop(&mut self) {
        // Ensure all buffered data is flushed to disk
        let _ = self.writer.get_mut().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("app.log");

        let appender = FileAppender::new(&path).unwrap();
        appender.append("first", LogLevel::Info).unwrap();
        appender.append("second", LogLevel::Error).unwrap();
        appender.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_reopen_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");

        {
            let appender = FileAppender::new(&path).unwrap();
            appender.append("before", LogLevel::Info).unwrap();
        }
        let appender = FileAppender::new(&path).unwrap();
        appender.append("after", LogLevel::Info).unwrap();
        drop(appender);

        assert_eq!(fs::read_to_string(&path).unwrap(), "before\nafter\n");
    }
}

// 📣 Notification sinks - best-effort broadcast of finalized rounds
//
// Sinks run after the round is committed. A failing sink is logged and never
// rolls anything back.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub trait NotificationSink: Send {
    fn name(&self) -> &str;

    fn push(&mut self, text: &str) -> Result<()>;
}

/// Emits the announcement through the log
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn push(&mut self, text: &str) -> Result<()> {
        info!(target: "broadcast", "{}", text);
        Ok(())
    }
}

/// Appends timestamped announcements to a file
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileSink {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotificationSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn push(&mut self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create broadcast directory: {:?}", parent))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open broadcast file: {:?}", self.path))?;

        let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S");
        writeln!(file, "[{}]\n{}\n", timestamp, text)
            .with_context(|| format!("Failed to write broadcast file: {:?}", self.path))?;

        Ok(())
    }
}

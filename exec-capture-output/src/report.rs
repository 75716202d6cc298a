//! JSON summary of a finished capture, written next to the output on request.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capture::{CaptureOutcome, CaptureRequest};
use crate::error::{Error, Result};

/// Serializable record of one capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReport {
    /// Program and arguments as given.
    pub command: Vec<String>,
    /// Resolved executable.
    pub executable: PathBuf,
    /// Output file.
    pub output: PathBuf,
    /// Child exit status.
    pub exit_status: u32,
    /// Terminating signal, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    /// Our own exit code.
    pub exit_code: u8,
    /// Whether the timeout fired.
    pub timed_out: bool,
    /// Whether all output was collected before we gave up draining.
    pub drained: bool,
    /// Bytes read from the PTY.
    pub bytes_read: u64,
    /// Bytes written to the output file.
    pub bytes_written: u64,
    /// Spawn time (RFC 3339).
    pub started_at: DateTime<Utc>,
    /// Finish time (RFC 3339).
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl CaptureReport {
    /// Build a report from a request and its outcome.
    pub fn from_outcome(request: &CaptureRequest, outcome: &CaptureOutcome) -> Self {
        Self {
            command: request.command_line(),
            executable: outcome.executable.clone(),
            output: request.output.clone(),
            exit_status: outcome.exit_status,
            signal: outcome.signal.clone(),
            exit_code: outcome.exit_code(),
            timed_out: outcome.timed_out,
            drained: outcome.drained,
            bytes_read: outcome.bytes_read,
            bytes_written: outcome.bytes_written,
            started_at: outcome.started_at,
            finished_at: outcome.finished_at,
            duration_ms: u64::try_from(outcome.duration().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report to `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
        }
        let mut json = self.to_json()?;
        json.push('\n');
        std::fs::write(path, json).map_err(|e| Error::io_with_path(e, path))?;
        tracing::debug!(path = %path.display(), "wrote capture report");
        Ok(())
    }
}

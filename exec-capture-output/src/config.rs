//! File-backed defaults.
//!
//! Settings are read from a TOML file. An explicit path (from `--config` or
//! `EXEC_CAPTURE_OUTPUT_CONFIG`) must exist; otherwise the platform config
//! directory is consulted, and a missing file there just means defaults.
//!
//! ```toml
//! append = false
//! echo = true
//! normalize_newlines = true
//! term = "xterm-256color"
//! rows = 50
//! cols = 132
//! drain_timeout_ms = 2000
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Directory name under the platform config dir.
pub const CONFIG_DIR_NAME: &str = "exec-capture-output";

/// File name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default grace period for draining PTY output after the child exits.
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 2000;

/// Capture defaults that the command line may override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Append to the output file instead of truncating it.
    pub append: bool,
    /// Echo captured output to stdout.
    pub echo: bool,
    /// Convert `\r\n` to `\n` in the output file.
    pub normalize_newlines: bool,
    /// `TERM` value for the child.
    pub term: Option<String>,
    /// PTY rows.
    pub rows: Option<u16>,
    /// PTY columns.
    pub cols: Option<u16>,
    /// Milliseconds to keep reading after the child exits.
    pub drain_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            append: false,
            echo: true,
            normalize_newlines: false,
            term: None,
            rows: None,
            cols: None,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
        }
    }
}

impl CaptureConfig {
    /// Load configuration.
    ///
    /// With `explicit` set, that file must exist and parse. Without it, the
    /// default location is used if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) if !path.is_file() => Err(Error::config(format!(
                "config file not found: {}",
                path.display()
            ))),
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                Some(path) => {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    Ok(Self::default())
                }
                None => Ok(Self::default()),
            },
        }
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.rows == Some(0) {
            return Err(Error::config("rows must be greater than zero"));
        }
        if self.cols == Some(0) {
            return Err(Error::config("cols must be greater than zero"));
        }
        if matches!(self.term.as_deref(), Some("")) {
            return Err(Error::config("term must not be empty"));
        }
        Ok(())
    }
}

/// Default config file location, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

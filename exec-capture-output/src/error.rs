//! Error types for exec-capture-output.

use std::path::{Path, PathBuf};

/// Errors that can occur while preparing or running a capture.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The command could not be found as a path or on `PATH`
    #[error("command not found: {program}")]
    CommandNotFound {
        /// Program name as given on the command line
        program: String,
    },

    /// The resolved command is not something we can execute
    #[error("not executable: {}", .path.display())]
    NotExecutable {
        /// Resolved path
        path: PathBuf,
    },

    /// Pseudo-terminal allocation or spawn failure
    #[error("pty error: {message}")]
    Pty {
        /// Human-readable error message
        message: String,
    },

    /// I/O error, with the path involved when there is one
    #[error("I/O error{}: {source}", at_path(.path))]
    Io {
        /// Path being read or written, if known
        path: Option<PathBuf>,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file problem
    #[error("configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// Command-line value that parsed but makes no sense
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What went wrong
        message: String,
    },

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn at_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" at {}", p.display()))
        .unwrap_or_default()
}

/// Convenience `Result` type alias.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { path: None, source }
    }
}

impl Error {
    /// Process exit code to report for this error.
    ///
    /// Follows the shell conventions: 127 for a missing command, 126 for
    /// one that cannot be executed, 2 for usage problems.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::CommandNotFound { .. } => 127,
            Error::NotExecutable { .. } => 126,
            Error::Config { .. } | Error::InvalidArgument { .. } => 2,
            Error::Pty { .. } | Error::Io { .. } | Error::Serialization(_) => 1,
        }
    }

    /// Creates a pty error from anything displayable.
    ///
    /// `portable-pty` reports failures as `anyhow::Error`, so we keep only
    /// the message.
    pub fn pty<S: ToString>(message: S) -> Self {
        Error::Pty {
            message: message.to_string(),
        }
    }

    /// Wraps an I/O error together with the path it concerns.
    pub fn io_with_path<P: AsRef<Path>>(source: std::io::Error, path: P) -> Self {
        Error::Io {
            path: Some(path.as_ref().to_path_buf()),
            source,
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates a new invalid-argument error.
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }
}

//! Where captured bytes go.
//!
//! The [`CaptureSink`] receives raw chunks read from the PTY master. Each
//! chunk goes to the output file (optionally with `\r\n` folded to `\n`)
//! and, when echo is on, unchanged to our own stdout.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Streaming `\r\n` to `\n` conversion.
///
/// A `\r` at the end of a chunk is held back until the next byte is seen,
/// so the result does not depend on how the stream was split. A lone `\r`
/// (progress bars redrawing a line) passes through.
#[derive(Debug, Default, Clone)]
pub struct NewlineNormalizer {
    pending_cr: bool,
}

impl NewlineNormalizer {
    /// Create a normalizer with no held-back state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize `input`, appending to `out`.
    pub fn push(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &byte in input {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    out.push(b'\n');
                    continue;
                }
                out.push(b'\r');
            }
            if byte == b'\r' {
                self.pending_cr = true;
            } else {
                out.push(byte);
            }
        }
    }

    /// Emit anything still held back.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if self.pending_cr {
            self.pending_cr = false;
            out.push(b'\r');
        }
    }
}

/// Output file plus optional echo target.
///
/// Chunks go straight to the file with no buffering on our side, so the file
/// is complete up to the last chunk even if `finish` never runs.
pub struct CaptureSink {
    file: File,
    path: PathBuf,
    echo: Option<Box<dyn Write + Send>>,
    normalizer: Option<NewlineNormalizer>,
    scratch: Vec<u8>,
    bytes_written: u64,
}

impl std::fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSink")
            .field("path", &self.path)
            .field("echo", &self.echo.is_some())
            .field("normalize", &self.normalizer.is_some())
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}

impl CaptureSink {
    /// Open (creating parent directories) the output file.
    ///
    /// The file is truncated unless `append` is set.
    pub fn create(path: &Path, append: bool, normalize_newlines: bool) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options.open(path).map_err(|e| Error::io_with_path(e, path))?;
        tracing::debug!(path = %path.display(), append, "opened output file");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            echo: None,
            normalizer: normalize_newlines.then(NewlineNormalizer::new),
            scratch: Vec::new(),
            bytes_written: 0,
        })
    }

    /// Also copy every chunk, unmodified, to `echo`.
    pub fn with_echo(mut self, echo: Box<dyn Write + Send>) -> Self {
        self.echo = Some(echo);
        self
    }

    /// Path of the output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written to the file so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Write one chunk read from the PTY.
    ///
    /// A failing echo target (closed stdout) disables echo; the file keeps
    /// receiving output.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if let Some(echo) = self.echo.as_mut() {
            if let Err(e) = echo.write_all(chunk).and_then(|()| echo.flush()) {
                tracing::warn!("echo to stdout failed, continuing without it: {e}");
                self.echo = None;
            }
        }

        match self.normalizer.as_mut() {
            Some(normalizer) => {
                self.scratch.clear();
                normalizer.push(chunk, &mut self.scratch);
                write_file(&mut self.file, &self.path, &self.scratch)?;
                self.bytes_written += self.scratch.len() as u64;
            }
            None => {
                write_file(&mut self.file, &self.path, chunk)?;
                self.bytes_written += chunk.len() as u64;
            }
        }
        Ok(())
    }

    /// Flush everything and return the number of bytes written to the file.
    pub fn finish(mut self) -> Result<u64> {
        if let Some(normalizer) = self.normalizer.as_mut() {
            self.scratch.clear();
            normalizer.finish(&mut self.scratch);
            write_file(&mut self.file, &self.path, &self.scratch)?;
            self.bytes_written += self.scratch.len() as u64;
        }
        self.file
            .flush()
            .map_err(|e| Error::io_with_path(e, &self.path))?;
        Ok(self.bytes_written)
    }
}

fn write_file(file: &mut File, path: &Path, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    file.write_all(bytes)
        .map_err(|e| Error::io_with_path(e, path))
}

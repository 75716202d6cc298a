//! Running a command under a pseudo-terminal and capturing what it prints.
//!
//! The child is attached to the slave side of a fresh PTY, so it sees a
//! terminal and keeps its colors and line buffering. We read the master side
//! on a blocking task and hand every chunk to a [`CaptureSink`].
//!
//! # Lifecycle
//!
//! 1. Resolve the executable and open the output file.
//! 2. Open the PTY and spawn the child; drop our slave handle so the master
//!    sees EOF once the child (and anything inheriting the terminal) exits.
//! 3. Race the child's exit against the optional timeout and a failing
//!    reader. A timeout or a reader error kills the child: `SIGHUP` first,
//!    then `SIGKILL` if it is still alive shortly after.
//! 4. Give the reader `drain_timeout` to collect what is still buffered.
//!
//! # Usage
//!
//! ```rust,ignore
//! use exec_capture_output::capture::{self, CaptureRequest};
//!
//! let request = CaptureRequest::new("cargo", "build.log")
//!     .with_args(["build", "--color=always"])
//!     .with_echo(false);
//! let outcome = capture::run(&request).await?;
//! std::process::exit(outcome.exit_code().into());
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use portable_pty::{Child, ChildKiller, CommandBuilder, ExitStatus, native_pty_system};
use tokio::task::JoinError;

use crate::config::DEFAULT_DRAIN_TIMEOUT_MS;
use crate::error::{Error, Result};
use crate::pty::PtyDimensions;
use crate::resolve::resolve_executable;
use crate::sink::CaptureSink;

/// `TERM` given to the child when neither we nor the request have one.
pub const DEFAULT_TERM: &str = "xterm-256color";

/// Exit code reported when the timeout fired, as coreutils `timeout` does.
pub const TIMEOUT_EXIT_CODE: u8 = 124;

const READ_BUFFER_SIZE: usize = 8192;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

// A hung-up PTY master reports EIO rather than EOF on Linux and macOS.
const EIO: i32 = 5;

/// Everything needed to run one capture.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Program as given by the user; resolved at run time.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// File receiving the captured output.
    pub output: PathBuf,
    /// Working directory for the child, also used to resolve relative programs.
    pub cwd: PathBuf,
    /// Extra environment variables, applied after `TERM`.
    pub env: Vec<(String, String)>,
    /// `TERM` override.
    pub term: Option<String>,
    /// PTY window size.
    pub dimensions: PtyDimensions,
    /// Append to the output file instead of truncating it.
    pub append: bool,
    /// Copy output to our stdout as it arrives.
    pub echo: bool,
    /// Fold `\r\n` to `\n` in the file.
    pub normalize_newlines: bool,
    /// Kill the child after this long.
    pub timeout: Option<Duration>,
    /// How long to keep reading after the child exits.
    pub drain_timeout: Duration,
}

impl CaptureRequest {
    /// A request with defaults: current directory, echo on, default PTY size.
    pub fn new(program: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output: output.into(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env: Vec::new(),
            term: None,
            dimensions: PtyDimensions::default(),
            append: false,
            echo: true,
            normalize_newlines: false,
            timeout: None,
            drain_timeout: Duration::from_millis(DEFAULT_DRAIN_TIMEOUT_MS),
        }
    }

    /// Set the program arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Override `TERM`.
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    /// Set the PTY size.
    pub fn with_dimensions(mut self, dimensions: PtyDimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Append instead of truncating.
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Turn echo to stdout on or off.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Turn newline normalization on or off.
    pub fn with_normalize_newlines(mut self, normalize: bool) -> Self {
        self.normalize_newlines = normalize;
        self
    }

    /// Kill the child after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the post-exit drain period.
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// The program followed by its arguments.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// What happened during a capture.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    /// Path that was actually executed.
    pub executable: PathBuf,
    /// Exit code reported for the child.
    pub exit_status: u32,
    /// Signal that terminated the child, if any.
    pub signal: Option<String>,
    /// Whether we killed the child because of the timeout.
    pub timed_out: bool,
    /// Bytes read from the PTY.
    pub bytes_read: u64,
    /// Bytes written to the output file.
    pub bytes_written: u64,
    /// False if the reader was still busy when the drain period ran out.
    pub drained: bool,
    /// When the child was spawned.
    pub started_at: DateTime<Utc>,
    /// When the capture finished.
    pub finished_at: DateTime<Utc>,
}

impl CaptureOutcome {
    /// Exit code for our own process.
    pub fn exit_code(&self) -> u8 {
        if self.timed_out {
            TIMEOUT_EXIT_CODE
        } else {
            u8::try_from(self.exit_status).unwrap_or(u8::MAX)
        }
    }

    /// True when the child exited with status zero on its own.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_status == 0
    }

    /// Wall-clock time between spawn and finish.
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Counters shared with the reader task, readable even if it never finishes.
#[derive(Debug, Default)]
struct Progress {
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

/// Run `request` to completion.
pub async fn run(request: &CaptureRequest) -> Result<CaptureOutcome> {
    // The child is spawned with this cwd, so a relative one would be applied twice.
    let cwd =
        std::path::absolute(&request.cwd).map_err(|e| Error::io_with_path(e, &request.cwd))?;
    if !cwd.is_dir() {
        return Err(Error::invalid_argument(format!(
            "working directory does not exist: {}",
            request.cwd.display()
        )));
    }
    let executable = resolve_executable(&request.program, &cwd)?;
    tracing::info!(
        executable = %executable.display(),
        args = ?request.args,
        output = %request.output.display(),
        "starting capture"
    );

    let mut sink =
        CaptureSink::create(&request.output, request.append, request.normalize_newlines)?;
    if request.echo {
        sink = sink.with_echo(Box::new(std::io::stdout()));
    }

    let pair = native_pty_system()
        .openpty(request.dimensions.into())
        .map_err(Error::pty)?;
    tracing::debug!(
        rows = request.dimensions.rows,
        cols = request.dimensions.cols,
        "opened pty"
    );

    let started_at = Utc::now();
    let mut child = pair
        .slave
        .spawn_command(build_command(request, &cwd, &executable))
        .map_err(Error::pty)?;
    drop(pair.slave);
    tracing::debug!(pid = ?child.process_id(), "spawned child");

    let reader = match pair.master.try_clone_reader() {
        Ok(reader) => reader,
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::pty(e));
        }
    };

    let progress = Arc::new(Progress::default());
    let mut pump = {
        let progress = Arc::clone(&progress);
        tokio::task::spawn_blocking(move || pump_output(reader, sink, &progress))
    };
    let kill = Arc::new(AtomicBool::new(false));
    let mut wait = {
        let kill = Arc::clone(&kill);
        tokio::task::spawn_blocking(move || supervise(child, &kill))
    };

    let deadline = async {
        match request.timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut timed_out = false;
    let mut pump_result: Option<Result<u64>> = None;
    let status = loop {
        tokio::select! {
            joined = &mut wait => break joined,
            () = &mut deadline, if !timed_out => {
                timed_out = true;
                tracing::warn!(timeout = ?request.timeout, "command timed out, killing it");
                kill.store(true, Ordering::Release);
            }
            joined = &mut pump, if pump_result.is_none() => {
                let result = flatten(joined);
                if let Err(e) = &result {
                    tracing::error!("capture failed, killing child: {e}");
                    kill.store(true, Ordering::Release);
                }
                pump_result = Some(result);
            }
        }
    };
    let status = status
        .map_err(|e| Error::pty(format!("wait task failed: {e}")))?
        .map_err(Error::from)?;

    let drained = match pump_result {
        Some(result) => {
            result?;
            true
        }
        None => match tokio::time::timeout(request.drain_timeout, &mut pump).await {
            Ok(joined) => {
                flatten(joined)?;
                true
            }
            Err(_) => {
                tracing::warn!(
                    drain_timeout = ?request.drain_timeout,
                    "pty still open after the command exited, giving up on the rest"
                );
                false
            }
        },
    };

    let outcome = CaptureOutcome {
        executable,
        exit_status: status.exit_code(),
        signal: status.signal().map(str::to_string),
        timed_out,
        bytes_read: progress.bytes_read.load(Ordering::Relaxed),
        bytes_written: progress.bytes_written.load(Ordering::Relaxed),
        drained,
        started_at,
        finished_at: Utc::now(),
    };
    tracing::info!(
        exit_status = outcome.exit_status,
        signal = ?outcome.signal,
        timed_out,
        bytes = outcome.bytes_written,
        "capture finished"
    );
    Ok(outcome)
}

/// Wait for the child, killing it once `kill` is raised.
///
/// `Child::kill` sends `SIGHUP`, gives the child a moment to exit, then
/// escalates to `SIGKILL`.
fn supervise(
    mut child: Box<dyn Child + Send + Sync>,
    kill: &AtomicBool,
) -> std::io::Result<ExitStatus> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if kill.load(Ordering::Acquire) {
            if let Err(e) = child.kill() {
                tracing::warn!("failed to kill child: {e}");
            }
            return child.wait();
        }
        std::thread::sleep(WAIT_POLL_INTERVAL);
    }
}

fn build_command(request: &CaptureRequest, cwd: &Path, executable: &Path) -> CommandBuilder {
    let mut cmd = CommandBuilder::new(executable);
    cmd.args(&request.args);
    // portable-pty falls back to $HOME when no cwd is set
    cmd.cwd(cwd);

    let term = request
        .term
        .clone()
        .or_else(|| std::env::var("TERM").ok().filter(|t| !t.is_empty()))
        .unwrap_or_else(|| DEFAULT_TERM.to_string());
    cmd.env("TERM", term);
    for (key, value) in &request.env {
        cmd.env(key, value);
    }
    cmd
}

fn pump_output(
    mut reader: Box<dyn Read + Send>,
    mut sink: CaptureSink,
    progress: &Progress,
) -> Result<u64> {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                sink.write_chunk(&buf[..n])?;
                progress.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
                progress
                    .bytes_written
                    .store(sink.bytes_written(), Ordering::Relaxed);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) if e.raw_os_error() == Some(EIO) => break,
            Err(e) => return Err(e.into()),
        }
    }
    tracing::trace!(path = %sink.path().display(), "pty closed");
    let written = sink.finish()?;
    progress.bytes_written.store(written, Ordering::Relaxed);
    Ok(written)
}

fn flatten(joined: std::result::Result<Result<u64>, JoinError>) -> Result<u64> {
    joined.map_err(|e| Error::pty(format!("reader task failed: {e}")))?
}

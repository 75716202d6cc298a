//! Command-line interface.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::capture::CaptureRequest;
use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use crate::logging::DEFAULT_VERBOSITY;
use crate::pty::PtyDimensions;

/// Run a command in a pty, capturing the colorized output to a file.
#[derive(Parser, Debug)]
#[command(name = "exec-capture-output", version, about, long_about = None)]
pub struct Cli {
    /// File that receives everything the command prints
    #[arg(short, long = "output-file", value_name = "PATH")]
    pub output_file: PathBuf,

    /// Append to the output file instead of truncating it
    #[arg(short, long)]
    pub append: bool,

    /// Do not copy the output to stdout
    #[arg(long)]
    pub no_echo: bool,

    /// Convert CRLF line endings to LF in the output file
    #[arg(long)]
    pub normalize_newlines: bool,

    /// Working directory for the command
    #[arg(short = 'C', long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Extra environment variable for the command (repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// TERM value for the command
    #[arg(long, value_name = "TERM")]
    pub term: Option<String>,

    /// Terminal rows
    #[arg(long)]
    pub rows: Option<u16>,

    /// Terminal columns
    #[arg(long)]
    pub cols: Option<u16>,

    /// Kill the command after this many seconds
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Write a JSON summary of the run to this file
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, env = "EXEC_CAPTURE_OUTPUT_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More log output (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Less log output (repeatable)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "verbose")]
    pub quiet: u8,

    /// Include timestamps in log output
    #[arg(long)]
    pub log_timestamps: bool,

    /// Command to run, followed by its arguments
    #[arg(
        value_name = "COMMAND",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

impl Cli {
    /// Effective verbosity: the default, raised by `-v`, lowered by `-q`.
    pub fn verbosity(&self) -> u8 {
        DEFAULT_VERBOSITY
            .saturating_add(self.verbose)
            .saturating_sub(self.quiet)
    }

    /// Combine the command line with file defaults into a request.
    pub fn into_request(self, config: &CaptureConfig) -> Result<CaptureRequest> {
        let mut command = self.command.into_iter();
        let program = command
            .next()
            .ok_or_else(|| Error::invalid_argument("no command given"))?;

        let dimensions =
            PtyDimensions::resolve(self.rows.or(config.rows), self.cols.or(config.cols))?;

        let mut request = CaptureRequest::new(program, self.output_file)
            .with_args(command)
            .with_dimensions(dimensions)
            .with_append(self.append || config.append)
            .with_echo(config.echo && !self.no_echo)
            .with_normalize_newlines(self.normalize_newlines || config.normalize_newlines)
            .with_drain_timeout(Duration::from_millis(config.drain_timeout_ms));

        if let Some(cwd) = self.cwd {
            request = request.with_cwd(cwd);
        }
        if let Some(term) = self.term.or_else(|| config.term.clone()) {
            request = request.with_term(term);
        }
        match self.timeout {
            Some(0) => return Err(Error::invalid_argument("timeout must be at least 1 second")),
            Some(secs) => request = request.with_timeout(Duration::from_secs(secs)),
            None => {}
        }
        for (key, value) in self.env {
            request = request.with_env(key, value);
        }
        Ok(request)
    }
}

/// Parse a `KEY=VALUE` pair. The value may be empty or contain `=`.
pub fn parse_env_pair(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some(("", _)) => Err(format!("empty variable name in `{s}`")),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

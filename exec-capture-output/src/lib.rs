#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Modules
//!
//! - [`capture`]: spawning the command under a PTY and collecting its output
//! - [`cli`]: command-line parsing
//! - [`config`]: file-backed defaults
//! - [`error`]: Error types and Result alias
//! - [`logging`]: tracing subscriber setup
//! - [`pty`]: terminal sizing
//! - [`report`]: JSON run summary
//! - [`resolve`]: executable lookup
//! - [`sink`]: output file and echo handling

pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod pty;
pub mod report;
pub mod resolve;
pub mod sink;

pub use capture::{CaptureOutcome, CaptureRequest};
pub use error::{Error, Result};

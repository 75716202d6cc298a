//! Common test utilities for exec-capture-output integration tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use exec_capture_output::CaptureRequest;
use tempfile::TempDir;

/// Scratch directory holding the output file and an isolated config home.
pub struct TestHarness {
    tmp: TempDir,
}

impl TestHarness {
    /// Creates a harness backed by a fresh temp directory.
    pub fn new() -> Self {
        Self {
            tmp: TempDir::new().expect("create temp dir"),
        }
    }

    /// Root of the temp directory.
    pub fn dir(&self) -> &Path {
        self.tmp.path()
    }

    /// Output file used by [`Self::shell`] and the CLI tests.
    pub fn output(&self) -> PathBuf {
        self.dir().join("out.log")
    }

    /// Request for `sh -c <script>` writing to [`Self::output`], echo off.
    pub fn shell(&self, script: &str) -> CaptureRequest {
        CaptureRequest::new("sh", self.output())
            .with_args(["-c", script])
            .with_cwd(self.dir())
            .with_echo(false)
            .with_drain_timeout(Duration::from_secs(5))
    }

    /// Contents of [`Self::output`], lossily decoded.
    pub fn read_output(&self) -> String {
        String::from_utf8_lossy(&std::fs::read(self.output()).expect("read output")).into_owned()
    }

    /// The binary, with config lookups confined to the temp dir.
    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("exec-capture-output");
        cmd.env("XDG_CONFIG_HOME", self.dir().join("config"))
            .env("HOME", self.dir())
            .env_remove("EXEC_CAPTURE_OUTPUT_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

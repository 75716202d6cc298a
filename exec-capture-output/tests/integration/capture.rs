//! Library-level captures of real commands.

use std::time::{Duration, Instant};

use exec_capture_output::capture::{self, TIMEOUT_EXIT_CODE};
use exec_capture_output::pty::PtyDimensions;
use exec_capture_output::{CaptureRequest, Error};

use crate::common::TestHarness;

#[tokio::test]
async fn test_captures_output() {
    let h = TestHarness::new();
    let outcome = capture::run(&h.shell("printf 'hello world\\n'")).await.unwrap();

    assert!(outcome.success());
    assert_eq!(outcome.exit_code(), 0);
    assert!(outcome.drained);
    assert!(h.read_output().contains("hello world"));
}

#[tokio::test]
async fn test_child_sees_a_terminal() {
    let h = TestHarness::new();
    capture::run(&h.shell("if [ -t 1 ]; then echo is-tty; else echo not-tty; fi"))
        .await
        .unwrap();
    assert!(h.read_output().contains("is-tty"));
}

#[tokio::test]
async fn test_ansi_colors_preserved() {
    let h = TestHarness::new();
    capture::run(&h.shell("printf '\\033[31mred\\033[0m\\n'"))
        .await
        .unwrap();
    let bytes = std::fs::read(h.output()).unwrap();
    assert!(bytes.windows(8).any(|w| w == b"\x1b[31mred"));
}

#[tokio::test]
async fn test_pty_translates_newlines_by_default() {
    let h = TestHarness::new();
    capture::run(&h.shell("printf 'a\\nb\\n'")).await.unwrap();
    assert_eq!(h.read_output(), "a\r\nb\r\n");
}

#[tokio::test]
async fn test_normalize_newlines() {
    let h = TestHarness::new();
    let request = h.shell("printf 'a\\nb\\n'").with_normalize_newlines(true);
    let outcome = capture::run(&request).await.unwrap();
    assert_eq!(h.read_output(), "a\nb\n");
    assert_eq!(outcome.bytes_written, 4);
    assert_eq!(outcome.bytes_read, 6);
}

#[tokio::test]
async fn test_exit_status_propagates() {
    let h = TestHarness::new();
    let outcome = capture::run(&h.shell("echo failing; exit 7")).await.unwrap();
    assert_eq!(outcome.exit_status, 7);
    assert_eq!(outcome.exit_code(), 7);
    assert!(!outcome.success());
    assert!(h.read_output().contains("failing"));
}

#[tokio::test]
async fn test_missing_command_creates_no_file() {
    let h = TestHarness::new();
    let request = CaptureRequest::new("no-such-command-9c2e", h.output())
        .with_cwd(h.dir())
        .with_echo(false);
    let err = capture::run(&request).await.unwrap_err();
    assert!(matches!(err, Error::CommandNotFound { .. }));
    assert!(!h.output().exists());
}

#[tokio::test]
async fn test_missing_cwd_rejected() {
    let h = TestHarness::new();
    let request = h.shell("true").with_cwd(h.dir().join("gone"));
    let err = capture::run(&request).await.unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_timeout_kills_child() {
    let h = TestHarness::new();
    let request = CaptureRequest::new("sleep", h.output())
        .with_args(["30"])
        .with_cwd(h.dir())
        .with_echo(false)
        .with_timeout(Duration::from_millis(300));

    let started = Instant::now();
    let outcome = capture::run(&request).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(20));
    assert!(outcome.timed_out);
    assert_eq!(outcome.exit_code(), TIMEOUT_EXIT_CODE);
}

#[tokio::test]
async fn test_timeout_kills_child_ignoring_hangup() {
    let h = TestHarness::new();
    let request = h
        .shell("trap '' HUP; sleep 4; echo survived")
        .with_timeout(Duration::from_millis(300))
        .with_drain_timeout(Duration::from_millis(500));

    let started = Instant::now();
    let outcome = capture::run(&request).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(outcome.timed_out);
    assert_eq!(outcome.signal.as_deref().map(str::is_empty), Some(false));
    assert_eq!(outcome.exit_code(), TIMEOUT_EXIT_CODE);
    assert!(!h.read_output().contains("survived"));
}

#[tokio::test]
async fn test_killed_by_signal() {
    let h = TestHarness::new();
    let outcome = capture::run(&h.shell("kill -KILL $$")).await.unwrap();
    assert!(outcome.signal.is_some());
    assert_eq!(outcome.exit_status, 1);
    assert_eq!(outcome.exit_code(), 1);
    assert!(!outcome.timed_out);
}

#[tokio::test]
async fn test_append_keeps_previous_runs() {
    let h = TestHarness::new();
    capture::run(&h.shell("echo first")).await.unwrap();
    capture::run(&h.shell("echo second").with_append(true))
        .await
        .unwrap();
    let text = h.read_output();
    let first = text.find("first").unwrap();
    let second = text.find("second").unwrap();
    assert!(first < second);
}

#[tokio::test]
async fn test_truncates_without_append() {
    let h = TestHarness::new();
    capture::run(&h.shell("echo first")).await.unwrap();
    capture::run(&h.shell("echo second")).await.unwrap();
    let text = h.read_output();
    assert!(!text.contains("first"));
    assert!(text.contains("second"));
}

#[tokio::test]
async fn test_env_and_term() {
    let h = TestHarness::new();
    let request = h
        .shell("printf '%s|%s' \"$GREETING\" \"$TERM\"")
        .with_env("GREETING", "hi there")
        .with_term("vt100");
    capture::run(&request).await.unwrap();
    assert_eq!(h.read_output(), "hi there|vt100");
}

#[tokio::test]
async fn test_runs_in_requested_directory() {
    let h = TestHarness::new();
    std::fs::write(h.dir().join("marker.txt"), "").unwrap();
    capture::run(&h.shell("ls")).await.unwrap();
    assert!(h.read_output().contains("marker.txt"));
}

#[tokio::test]
async fn test_window_size() {
    let h = TestHarness::new();
    let request = h
        .shell("stty size")
        .with_dimensions(PtyDimensions { rows: 30, cols: 100 });
    capture::run(&request).await.unwrap();
    assert_eq!(h.read_output().trim(), "30 100");
}

#[tokio::test]
async fn test_bytes_written_matches_file() {
    let h = TestHarness::new();
    let outcome = capture::run(&h.shell("seq 1 500")).await.unwrap();
    let len = std::fs::metadata(h.output()).unwrap().len();
    assert_eq!(outcome.bytes_written, len);
    assert_eq!(outcome.bytes_read, len);
    assert!(h.read_output().contains("500"));
}

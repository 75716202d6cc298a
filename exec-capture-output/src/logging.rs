//! Diagnostic logging setup.
//!
//! Logs always go to stderr; stdout belongs to the echoed capture.

use tracing_subscriber::EnvFilter;

/// Verbosity when neither `-q` nor `-v` is given, with `0` being `-q`.
pub const DEFAULT_VERBOSITY: u8 = 1;

/// Map a verbosity level to a filter directive.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence when set.
pub fn init(verbosity: u8, timestamps: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // try_init: a second call (tests) must not abort the process
    let result = if timestamps {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };
    if let Err(e) = result {
        tracing::debug!("logging already initialised: {e}");
    }
}

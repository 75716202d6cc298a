//! exec-capture-output entry point.

use clap::Parser;

use exec_capture_output::capture;
use exec_capture_output::cli::Cli;
use exec_capture_output::config::CaptureConfig;
use exec_capture_output::logging;
use exec_capture_output::report::CaptureReport;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbosity(), cli.log_timestamps);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            let code = e
                .downcast_ref::<exec_capture_output::Error>()
                .map_or(1, exec_capture_output::Error::exit_code);
            tracing::debug!("failing with exit code {code}");
            eprintln!("exec-capture-output: {e:#}");
            code
        }
    };

    // Exit without dropping the runtime: a reader still blocked on a PTY
    // held open by a background process would stall shutdown.
    std::process::exit(i32::from(code));
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = CaptureConfig::load(cli.config.as_deref())?;
    let report_path = cli.report.clone();
    let request = cli.into_request(&config)?;

    let outcome = capture::run(&request).await?;

    // The capture already happened; a lost report does not change its status.
    if let Some(path) = report_path
        && let Err(e) = CaptureReport::from_outcome(&request, &outcome).write(&path)
    {
        tracing::warn!(path = %path.display(), "failed to write report: {e}");
    }

    if !outcome.success() {
        tracing::info!(exit_code = outcome.exit_code(), "command did not succeed");
    }
    Ok(outcome.exit_code())
}

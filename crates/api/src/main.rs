//! Faultline - resilience runtime
//!
//! Main entry point: load configuration, wire the services, run until an
//! interrupt or an escalation decision asks to exit, then drain cleanups.

use std::process::ExitCode;

use faultline_app::{AppContext, ExitIntent};
use faultline_infra::{init_tracing, install_panic_hook};
use tracing::{debug, info, warn};

/// Exit status asking the service manager for a fresh process
const RESTART_EXIT_CODE: u8 = 75;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            // Tracing may not be initialised yet
            eprintln!("faultline: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let dotenv = dotenvy::dotenv();
    let config = faultline_infra::config::load()?;
    let _log_guard = init_tracing(&config.logging)?;
    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!(error = %e, "No .env file loaded"),
    }

    let ctx = AppContext::new(config)?;
    let _panic_pump = install_panic_hook(ctx.recorder.clone());
    ctx.start().await?;
    info!(session_id = %ctx.recorder.session_id(), "Faultline running");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for interrupt, shutting down");
            }
            info!("Interrupt received");
        }
        _ = ctx.signal.cancelled() => {
            info!(intent = ?ctx.signal.intent(), "Exit requested by escalation decision");
        }
    }

    let report = ctx.shutdown().await?;
    Ok(match ctx.signal.intent() {
        Some(ExitIntent::Restart) => ExitCode::from(RESTART_EXIT_CODE),
        _ if report.is_clean() => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

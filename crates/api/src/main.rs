//! `matchday-api` binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (tracing, optional OTLP).
//! 3. Open the session store, start the sweeper, bind the listener.
//! 4. Wait for the first shutdown trigger and drain.
//! 5. Exit with the drain's status.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use api::config::Config;
use api::lifecycle::{self, startup};
use api::telemetry::{self, TracingSink};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %cfg.app_env,
        port = cfg.port,
        "matchday-api starting"
    );

    // -----------------------------------------------------------------------
    // 3. Resources
    // -----------------------------------------------------------------------
    let startup::Started {
        controller,
        mut triggers,
        ..
    } = match startup::start(&cfg, Arc::new(TracingSink)).await {
        Ok(started) => started,
        Err(e) => {
            error!(error = %format!("{e:#}"), "startup failed");
            telemetry::shutdown_telemetry();
            return Err(e);
        }
    };

    // -----------------------------------------------------------------------
    // 4. Serve until told to stop
    // -----------------------------------------------------------------------
    let outcome = controller.run(&mut triggers).await;
    let code = lifecycle::exit_code(&outcome);
    drop(triggers);

    // -----------------------------------------------------------------------
    // 5. Exit
    // -----------------------------------------------------------------------
    telemetry::shutdown_telemetry();
    std::process::exit(code);
}

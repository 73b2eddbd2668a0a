//! Solar-fleet Modbus datalogger.
//!
//! Polls configured field devices on independent cadences and dispatches
//! normalized readings to the configured sinks.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use solarlog::{App, AppConfig, RunOptions};
use solarlog_common::LoggingConfig;

/// Unattended Modbus datalogger for solar installations.
#[derive(Parser, Debug)]
#[command(name = "solarlog")]
#[command(about = "Polls field devices over Modbus and dispatches readings to sinks")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "solarlog.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Echo each record to the console
    #[arg(long)]
    verbose: bool,

    /// Run the full pipeline but suppress file sink writes
    #[arg(long)]
    dry_run: bool,

    /// Skip the MQTT sink even if configured
    #[arg(long)]
    disable_mqtt: bool,

    /// Skip the collector sink even if configured
    #[arg(long)]
    disable_collector: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(&args.config)
        .with_context(|| format!("failed to load config from {:?}", args.config))?;

    let log_config = LoggingConfig {
        level: args
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone()),
        format: config.logging.format,
    };
    solarlog_common::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))?;

    info!(config = ?args.config, "datalogger starting");
    let started = Instant::now();

    let options = RunOptions {
        dry_run: args.dry_run,
        verbose: args.verbose,
        disable_mqtt: args.disable_mqtt,
        disable_collector: args.disable_collector,
    };

    // Validation failures abort here, before the scheduler starts.
    let app = App::build(config, options).context("startup failed")?;

    app.run().await;

    info!(
        elapsed_secs = started.elapsed().as_secs(),
        "datalogger stopped"
    );
    Ok(())
}

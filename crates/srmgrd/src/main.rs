//! srmgrd entry point: argument parsing, logging and collaborator
//! wiring.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sroof_client::{ControllerConfig, RestClient, RestFlowStore, RestTopologySource};
use sroof_core::{Srgb, DEFAULT_SRGB_START};
use srmgrd::{DaemonConfig, SrDaemon};

/// Segment-routing manager daemon.
#[derive(Debug, Parser)]
#[command(name = "srmgrd", version, about)]
struct Args {
    /// Path to the controller configuration file.
    #[arg(short = 'C', long, default_value = "./ctrl.yml")]
    config: PathBuf,

    /// Seconds between topology polls.
    #[arg(long, default_value_t = 5)]
    interval: u64,

    /// Start of the Segment Routing Global Block.
    #[arg(long, default_value_t = DEFAULT_SRGB_START)]
    srgb_start: u32,

    /// Run the initial full installation and exit.
    #[arg(long)]
    once: bool,

    /// Log filter (tracing env-filter syntax).
    #[arg(long, default_value = "info")]
    log: String,
}

fn init_logging(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    // A broken endpoint configuration is the one startup-fatal error;
    // everything later is retried or skipped.
    let config = ControllerConfig::load(Some(&args.config))
        .context("unusable controller configuration")?;
    info!(controller = %config.base_url(), "--- starting srmgrd ---");

    let client = RestClient::new(config)?;
    let store = RestFlowStore::new(client.clone());
    let source = RestTopologySource::new(client);

    let mut daemon = SrDaemon::new(
        DaemonConfig {
            poll_interval: Duration::from_secs(args.interval),
            srgb: Srgb::new(args.srgb_start),
        },
        store,
        source,
    );

    if args.once {
        let report = daemon.sync_once().await?;
        info!(
            installed = report.installed,
            failed = report.failed,
            "full installation done"
        );
        return Ok(());
    }

    daemon.run().await?;
    info!("srmgrd stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "srmgrd failed");
            ExitCode::FAILURE
        }
    }
}

//! Devsys Daemon - Main entry point
//!
//! Hosts the device registry, registers the configured devices, and reports
//! suitability queries and published device lists.

mod config;
mod publisher;
mod state;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "devsysd")]
#[command(about = "Device registry host daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "devsys.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Register, report, and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Devsys v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load_config(&args.config)?;
    info!(namespace = %config.registry.namespace, "Configuration loaded");

    let state = state::AppState::new(config);

    // Log snapshots as they are published
    let mut rx = state.subscribe();
    let forwarder = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(json) => debug!(event = %json, "Published device snapshot"),
                Err(RecvError::Lagged(n)) => debug!(skipped = n, "Snapshot channel lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    state.register_configured_devices();
    report(&state);

    if !args.once {
        info!("Running, press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        info!("Shutting down");
    }

    state.unregister_owned_devices();
    forwarder.abort();
    Ok(())
}

/// Print query results and the published device lists
fn report(state: &state::AppState) {
    println!(
        "Registry {}: {} devices",
        state.registry.namespace(),
        state.registry.len()
    );

    for outcome in state.resolve_queries() {
        match outcome.result {
            Ok(record) => println!(
                "{}: device {} ({} {} slot {}, serial {})",
                outcome.name,
                record.id,
                record.device.vendor_name,
                record.device.model_name,
                record.device.topological_id,
                record.device.serial_number
            ),
            Err(e) => {
                warn!(query = %outcome.name, error = %e, "Query unresolved");
                println!("{}: {:?} ({})", outcome.name, e.code(), e);
            }
        }
    }

    for list_name in state.options.names() {
        let entries = state.options.get(&list_name).unwrap_or_default();
        println!("{}:", list_name);
        for entry in entries {
            println!("  - {}", entry.label);
        }
    }
}

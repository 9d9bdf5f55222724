//! Weft daemon binary
//!
//! Loads configuration and runs a single mesh router.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};
use weft::{Config, Router};

/// Weft mesh router daemon
#[derive(Parser, Debug)]
#[command(name = "weftd", version, about)]
struct Args {
    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    info!("weftd starting");

    // Load configuration
    info!("Loading configuration");
    let (config, loaded_path) = if let Some(config_path) = &args.config {
        // Explicit config file specified - load only that file
        match Config::load_file(config_path) {
            Ok(config) => (config, Some(config_path.clone())),
            Err(e) => {
                error!("Failed to load configuration from {}: {}", config_path.display(), e);
                std::process::exit(1);
            }
        }
    } else {
        // Use default search paths
        match Config::load() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    match &loaded_path {
        Some(path) => info!(path = %path.display(), "Loaded config file"),
        None => info!("No config file found, using defaults"),
    }

    // Create router
    info!("Creating router");
    let mut router = match Router::new(config) {
        Ok(router) => router,
        Err(e) => {
            error!("Failed to create router: {}", e);
            std::process::exit(1);
        }
    };

    // Log router information
    info!(
        state = %router.state(),
        router_id = %router.router_id(),
        "Router created"
    );
    info!("  origin: {}", router.origin());
    for eid in router.own_eids() {
        info!("  eid: {}", eid);
    }

    // Start the router (binds the fabric, spawns the receive loop)
    if let Err(e) = router.start().await {
        error!("Failed to start router: {}", e);
        std::process::exit(1);
    }

    // Locally-destined datagrams surface on the delivery channel
    if let Some(mut deliveries) = router.take_deliveries() {
        tokio::spawn(async move {
            while let Some(delivery) = deliveries.recv().await {
                info!(
                    dest = %delivery.dest,
                    src = %delivery.src,
                    len = delivery.payload.len(),
                    "Datagram delivered"
                );
            }
        });
    }

    info!("weftd running, press Ctrl+C to exit");

    tokio::select! {
        result = router.run() => {
            if let Err(e) = result {
                error!("Router event loop failed: {}", e);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    info!("weftd shutting down");

    // Stop the router (detaches the fabric, closes the channels)
    if let Err(e) = router.stop().await {
        warn!("Error during shutdown: {}", e);
    }

    info!("weftd shutdown complete");
}

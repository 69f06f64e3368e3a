//! Portlet Container Server
//!
//! Loads the configuration, brings up the configured services and portlets, and
//! keeps them running until Ctrl+C or SIGTERM.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use portlet_container::core::{create_default_app_state, load_config, Config};
use portlet_container::portlet::HostRequest;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let matches = Command::new("portlet-container")
        .version(portlet_container::VERSION)
        .about("Runtime for pluggable portlets and host services.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("render")
                .long("render")
                .value_name("ID")
                .help("Render a configured portlet once and print its markup"),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .action(ArgAction::SetTrue)
                .help("Shut down right after startup"),
        )
        .get_matches();

    // Load configuration
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => load_config(path)
            .with_context(|| format!("can't load configuration from {}", path.display()))?,
        None => {
            let mut config = Config::default();
            config.apply_env_overrides()?;
            config
        }
    };

    // Apply CLI overrides
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.to_ascii_lowercase();
    }
    config.validate()?;

    // Initialize logging
    portlet_container::init(&config.logging)?;

    let metrics_enabled = config.metrics.enabled;
    let state = create_default_app_state(config).context("can't create application state")?;
    if let Err(e) = state.startup() {
        state.shutdown();
        return Err(e).context("startup failed");
    }

    if let Some(id) = matches.get_one::<String>("render") {
        let mut request = HostRequest::new("/");
        match state.render(id, &mut request) {
            Ok(response) => println!("{}", response.body()),
            Err(e) => {
                state.shutdown();
                return Err(e).with_context(|| format!("can't render portlet '{}'", id));
            }
        }
    }

    if !matches.get_flag("once") && !matches.contains_id("render") {
        info!("Container running, press Ctrl+C to stop");
        shutdown_signal().await;
        warn!("Received shutdown signal, initiating graceful shutdown...");
    }

    state.shutdown();
    if metrics_enabled {
        print!("{}", state.collect_metrics());
    }

    info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}

// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! FluxION Monitor - Entry point
//!
//! Serves the anomaly API and runs nightly detection over all active units.

use anyhow::{Context, Result};
use clap::Parser;
use fluxion_anomaly::DetectionOrchestrator;
use fluxion_monitor::{ApiState, Database, MonitorConfig, NightlyScheduler, build_router, run_cycle};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fluxion-monitor")]
#[command(version, about = "Solar production anomaly monitor", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "./fluxion-monitor.toml")]
    config: String,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// Run one detection batch over all active units, print the report and exit
    #[arg(long, conflicts_with = "check")]
    run_once: bool,
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = MonitorConfig::from_file(&cli.config)?;
    init_tracing(&config.log_level);

    if cli.check {
        println!("Configuration OK: {}", cli.config);
        return Ok(());
    }

    info!("Starting FluxION Monitor v{}", env!("CARGO_PKG_VERSION"));

    let db = Arc::new(Database::open(&config.database.path)?);
    info!("Database opened: {}", config.database.path);

    let orchestrator = Arc::new(DetectionOrchestrator::new(
        db.clone(),
        db.clone(),
        db.clone(),
        &config.detection,
    ));

    if cli.run_once {
        let report = run_cycle(&orchestrator, &db, config.database.reading_retention_days).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let shutdown = Arc::new(Notify::new());
    let scheduler = NightlyScheduler::new(
        orchestrator.clone(),
        db.clone(),
        config.schedule.clone(),
        config.database.reading_retention_days,
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));

    let app = build_router(ApiState { db, orchestrator });

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
        .context("HTTP server error")?;

    shutdown.notify_one();
    if let Err(e) = scheduler_handle.await {
        warn!("Scheduler task ended abnormally: {e}");
    }

    info!("Shutting down");
    Ok(())
}

//! Rideshare Worker - driver allocation and fare calculation
//!
//! Runs allocation passes on a timer, prices completed rides and answers
//! NATS requests about rides, drivers and dispatch metrics.

mod cli;
mod config;
mod db;
mod defaults;
mod error;
mod handlers;
mod services;
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use sqlx::PgPool;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, SimulateArgs};
use crate::config::Config;
use crate::services::fare::FareCalculator;
use crate::services::lifecycle::RideLifecycle;
use crate::services::matcher::RideMatcher;
use crate::services::pass_history::PassHistory;
use crate::services::rates::{InMemoryRateTable, PgRateTable, RateTable};
use crate::services::scheduler::AllocationScheduler;
use crate::services::simulation::{Simulation, SimulationConfig};
use crate::services::store::{DispatchStore, InMemoryDispatchStore, PgDispatchStore};
use crate::services::summary::summarize;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "dispatch.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,rideshare_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!("Configuration loaded");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Migrate => {
            let pool = connect(&config).await?;
            db::run_migrations(&pool).await
        }
        Command::SeedPricing => {
            let pool = connect(&config).await?;
            db::ensure_pricing_seeded(&pool).await
        }
        Command::Pass => run_single_pass(&config).await,
        Command::Summary => print_summary(&config).await,
        Command::Simulate(args) => simulate(&config, args).await,
    }
}

async fn connect(config: &Config) -> Result<PgPool> {
    let pool = db::create_pool(config.require_database_url()?).await?;
    info!("Connected to PostgreSQL");
    Ok(pool)
}

fn pg_services(pool: &PgPool) -> (Arc<dyn DispatchStore>, Arc<dyn RateTable>) {
    (
        Arc::new(PgDispatchStore::new(pool.clone())),
        Arc::new(PgRateTable::new(pool.clone())),
    )
}

async fn serve(config: &Config) -> Result<()> {
    info!("Starting Rideshare Worker...");

    let pool = connect(config).await?;
    db::run_migrations(&pool).await?;
    db::ensure_pricing_seeded(&pool).await?;

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
        (Ok(user), Ok(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user, password)
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    let (store, rates) = pg_services(&pool);
    info!("Dispatch store initialized: {}", store.name());

    let matcher = Arc::new(RideMatcher::new(Arc::clone(&store), config.matching.clone()));
    let lifecycle = Arc::new(RideLifecycle::new(Arc::clone(&store), FareCalculator::new(rates)));
    let history = Arc::new(PassHistory::new());

    let scheduler = Arc::new(AllocationScheduler::new(
        matcher,
        Arc::clone(&history),
        config.allocation_interval,
    ));
    let scheduler_handle = scheduler.start();

    let result = tokio::select! {
        result = handlers::start_handlers(nats_client, store, lifecycle, history) => result,
        signal = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            signal.context("failed to listen for shutdown signal")
        }
    };

    scheduler.stop();
    if let Err(e) = scheduler_handle.await {
        error!("Allocation scheduler task failed: {}", e);
    }

    if let Err(e) = &result {
        error!("Handler error: {}", e);
    }
    result
}

async fn run_single_pass(config: &Config) -> Result<()> {
    let pool = connect(config).await?;
    let (store, _) = pg_services(&pool);
    let matcher = RideMatcher::new(store, config.matching.clone());

    let report = matcher.run_pass(Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn print_summary(config: &Config) -> Result<()> {
    let pool = connect(config).await?;
    let (store, _) = pg_services(&pool);

    let rides = store.list_rides().await?;
    let drivers = store.list_drivers().await?;
    println!("{}", serde_json::to_string_pretty(&summarize(&rides, &drivers))?);
    Ok(())
}

async fn simulate(config: &Config, args: SimulateArgs) -> Result<()> {
    let (store, rates): (Arc<dyn DispatchStore>, Arc<dyn RateTable>) = if args.in_memory {
        (
            Arc::new(InMemoryDispatchStore::new()),
            Arc::new(InMemoryRateTable::with_defaults()),
        )
    } else {
        let pool = connect(config).await?;
        db::run_migrations(&pool).await?;
        db::ensure_pricing_seeded(&pool).await?;
        pg_services(&pool)
    };

    let matcher = Arc::new(RideMatcher::new(Arc::clone(&store), config.matching.clone()));
    let lifecycle = RideLifecycle::new(Arc::clone(&store), FareCalculator::new(rates));
    let sim_config = SimulationConfig {
        seed: args.seed,
        days: args.days,
        riders: args.riders,
        drivers: args.drivers,
    };

    let mut simulation = Simulation::new(store, matcher, lifecycle, sim_config);
    let report = simulation.run(Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

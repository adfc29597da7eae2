//! Database module

pub mod queries;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Run database migrations embedded from `./migrations`
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    let migrator = sqlx::migrate!("./migrations");
    let versions: Vec<i64> = migrator.iter().map(|m| m.version).collect();
    info!("Compiled migration versions: {:?}", versions);

    migrator.run(pool).await.context("failed to run migrations")?;

    info!("Database migrations complete");
    Ok(())
}

/// Seed the pricing table with default rates if it is empty
pub async fn ensure_pricing_seeded(pool: &PgPool) -> Result<()> {
    let written = queries::pricing::seed_default_rates(pool).await?;
    if written > 0 {
        info!("Pricing configuration seeded with {} default rates", written);
    } else {
        info!("Pricing configuration already exists");
    }
    Ok(())
}

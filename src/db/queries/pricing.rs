//! Pricing configuration queries

use sqlx::PgPool;

use crate::error::Result;
use crate::types::RateKey;

/// Raw stored value for a rate key
pub async fn get_rate_value(pool: &PgPool, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM pricing_config WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(value,)| value))
}

/// Insert the default rates if the table is empty. Returns the number of rows written.
pub async fn seed_default_rates(pool: &PgPool) -> Result<usize> {
    let mut tx = pool.begin().await?;

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pricing_config")
        .fetch_one(&mut *tx)
        .await?;
    if count > 0 {
        return Ok(0);
    }

    for key in RateKey::ALL {
        sqlx::query("INSERT INTO pricing_config (key, value) VALUES ($1, $2)")
            .bind(key.as_str())
            .bind(key.default_value().to_string())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(RateKey::ALL.len())
}

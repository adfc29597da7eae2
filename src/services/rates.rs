//! Pricing rate table
//!
//! Named rates are read from the `pricing_config` key-value table in
//! production; tests and in-memory simulations use `InMemoryRateTable`.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;
use tracing::warn;

use crate::db::queries;
use crate::error::Result;
use crate::types::{FareRates, RateKey};

/// Read-only view of the pricing configuration
#[async_trait]
pub trait RateTable: Send + Sync {
    /// Resolve a named rate, falling back to `default` when the key is missing
    async fn get_rate(&self, key: &str, default: f64) -> Result<f64>;
}

/// Resolve the four fare rates, each with its built-in default
pub async fn resolve_fare_rates(table: &dyn RateTable) -> Result<FareRates> {
    Ok(FareRates {
        base_fare: rate(table, RateKey::BaseFare).await?,
        rate_per_km: rate(table, RateKey::RatePerKm).await?,
        rate_per_minute: rate(table, RateKey::RatePerMinute).await?,
        waiting_charge_per_minute: rate(table, RateKey::WaitingChargePerMinute).await?,
    })
}

async fn rate(table: &dyn RateTable, key: RateKey) -> Result<f64> {
    table.get_rate(key.as_str(), key.default_value()).await
}

/// Rate table backed by the `pricing_config` table
pub struct PgRateTable {
    pool: PgPool,
}

impl PgRateTable {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateTable for PgRateTable {
    async fn get_rate(&self, key: &str, default: f64) -> Result<f64> {
        let value = queries::pricing::get_rate_value(&self.pool, key).await?;
        Ok(parse_rate(key, value.as_deref(), default))
    }
}

fn parse_rate(key: &str, value: Option<&str>, default: f64) -> f64 {
    match value {
        None => default,
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => parsed,
            _ => {
                warn!("Pricing rate '{}' has unusable value '{}', using default {}", key, raw, default);
                default
            }
        },
    }
}

/// In-memory rate table
#[derive(Default)]
pub struct InMemoryRateTable {
    rates: RwLock<HashMap<String, f64>>,
}

impl InMemoryRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-filled with the default rates
    pub fn with_defaults() -> Self {
        let table = Self::new();
        for key in RateKey::ALL {
            table.set(key.as_str(), key.default_value());
        }
        table
    }

    pub fn set(&self, key: &str, value: f64) {
        self.rates.write().insert(key.to_string(), value);
    }
}

#[async_trait]
impl RateTable for InMemoryRateTable {
    async fn get_rate(&self, key: &str, default: f64) -> Result<f64> {
        Ok(self.rates.read().get(key).copied().unwrap_or(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_keys_resolve_to_defaults() {
        let table = InMemoryRateTable::new();
        let rates = resolve_fare_rates(&table).await.unwrap();
        assert_eq!(rates.base_fare, 20.0);
        assert_eq!(rates.rate_per_km, 10.0);
        assert_eq!(rates.rate_per_minute, 2.0);
        assert_eq!(rates.waiting_charge_per_minute, 1.0);
    }

    #[tokio::test]
    async fn stored_rates_override_defaults() {
        let table = InMemoryRateTable::with_defaults();
        table.set("rate_per_km", 12.5);
        let rates = resolve_fare_rates(&table).await.unwrap();
        assert_eq!(rates.rate_per_km, 12.5);
        assert_eq!(rates.base_fare, 20.0);
    }

    #[test]
    fn parse_rate_handles_text_values() {
        assert_eq!(parse_rate("base_fare", Some("25"), 20.0), 25.0);
        assert_eq!(parse_rate("base_fare", Some(" 7.5 "), 20.0), 7.5);
        assert_eq!(parse_rate("base_fare", None, 20.0), 20.0);
        assert_eq!(parse_rate("base_fare", Some("abc"), 20.0), 20.0);
        assert_eq!(parse_rate("base_fare", Some("NaN"), 20.0), 20.0);
        assert_eq!(parse_rate("rate_per_km", Some("-100"), 10.0), 10.0);
        assert_eq!(parse_rate("rate_per_km", Some("0"), 10.0), 0.0);
    }
}

//! Configuration management

use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::defaults::DEFAULT_ALLOCATION_INTERVAL_SECS;
use crate::services::matcher::MatchingConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// PostgreSQL connection string (only Postgres-backed commands need it)
    pub database_url: Option<String>,

    /// Time between allocation passes
    pub allocation_interval: Duration,

    pub matching: MatchingConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let nats_url = lookup("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());
        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());

        let interval_secs: u64 =
            parse_or(&lookup, "ALLOCATION_INTERVAL_SECS", DEFAULT_ALLOCATION_INTERVAL_SECS)?;
        if interval_secs == 0 {
            bail!("ALLOCATION_INTERVAL_SECS must be at least 1");
        }

        let defaults = MatchingConfig::default();
        let matching = MatchingConfig {
            radius_step_km: parse_or(&lookup, "SEARCH_RADIUS_STEP_KM", defaults.radius_step_km)?,
            max_radius_km: parse_or(&lookup, "MAX_SEARCH_RADIUS_KM", defaults.max_radius_km)?,
            cooldown_minutes: parse_or(
                &lookup,
                "RECENT_PAIRING_COOLDOWN_MINUTES",
                defaults.cooldown_minutes,
            )?,
            max_cancelled_rides: parse_or(&lookup, "MAX_CANCELLED_RIDES", defaults.max_cancelled_rides)?,
        };

        if !(matching.radius_step_km > 0.0) {
            bail!("SEARCH_RADIUS_STEP_KM must be positive (got {})", matching.radius_step_km);
        }
        if !(matching.max_radius_km >= matching.radius_step_km) {
            bail!(
                "MAX_SEARCH_RADIUS_KM ({}) must be at least SEARCH_RADIUS_STEP_KM ({})",
                matching.max_radius_km,
                matching.radius_step_km
            );
        }
        if matching.cooldown_minutes < 0 {
            bail!("RECENT_PAIRING_COOLDOWN_MINUTES must not be negative");
        }

        Ok(Self {
            nats_url,
            database_url,
            allocation_interval: Duration::from_secs(interval_secs),
            matching,
        })
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set")
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has invalid value '{}'", key, raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert!(config.database_url.is_none());
        assert!(config.require_database_url().is_err());
        assert_eq!(config.allocation_interval, Duration::from_secs(10));
        assert_eq!(config.matching, MatchingConfig::default());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://dispatch@localhost/rides"),
            ("ALLOCATION_INTERVAL_SECS", "5"),
            ("SEARCH_RADIUS_STEP_KM", "1.5"),
            ("MAX_SEARCH_RADIUS_KM", "9"),
            ("RECENT_PAIRING_COOLDOWN_MINUTES", "45"),
            ("MAX_CANCELLED_RIDES", "3"),
        ])
        .unwrap();
        assert_eq!(config.require_database_url().unwrap(), "postgres://dispatch@localhost/rides");
        assert_eq!(config.allocation_interval, Duration::from_secs(5));
        assert_eq!(config.matching.radius_step_km, 1.5);
        assert_eq!(config.matching.max_radius_km, 9.0);
        assert_eq!(config.matching.cooldown_minutes, 45);
        assert_eq!(config.matching.max_cancelled_rides, 3);
    }

    #[test]
    fn test_invalid_values_fail() {
        assert!(config_from(&[("MAX_CANCELLED_RIDES", "two")]).is_err());
        assert!(config_from(&[("SEARCH_RADIUS_STEP_KM", "0")]).is_err());
        assert!(config_from(&[("SEARCH_RADIUS_STEP_KM", "5"), ("MAX_SEARCH_RADIUS_KM", "4")]).is_err());
        assert!(config_from(&[("ALLOCATION_INTERVAL_SECS", "0")]).is_err());
    }
}

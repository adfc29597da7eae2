//! Pricing types

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_BASE_FARE, DEFAULT_RATE_PER_KM, DEFAULT_RATE_PER_MINUTE,
    DEFAULT_WAITING_CHARGE_PER_MINUTE,
};

/// Named rates in the pricing table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateKey {
    BaseFare,
    RatePerKm,
    RatePerMinute,
    WaitingChargePerMinute,
}

impl RateKey {
    pub const ALL: [RateKey; 4] = [
        RateKey::BaseFare,
        RateKey::RatePerKm,
        RateKey::RatePerMinute,
        RateKey::WaitingChargePerMinute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RateKey::BaseFare => "base_fare",
            RateKey::RatePerKm => "rate_per_km",
            RateKey::RatePerMinute => "rate_per_minute",
            RateKey::WaitingChargePerMinute => "waiting_charge_per_minute",
        }
    }

    pub fn default_value(&self) -> f64 {
        match self {
            RateKey::BaseFare => DEFAULT_BASE_FARE,
            RateKey::RatePerKm => DEFAULT_RATE_PER_KM,
            RateKey::RatePerMinute => DEFAULT_RATE_PER_MINUTE,
            RateKey::WaitingChargePerMinute => DEFAULT_WAITING_CHARGE_PER_MINUTE,
        }
    }
}

/// Rates resolved for one fare computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareRates {
    pub base_fare: f64,
    pub rate_per_km: f64,
    pub rate_per_minute: f64,
    pub waiting_charge_per_minute: f64,
}

impl FareRates {
    /// Each rate paired with its configuration key
    pub fn named(&self) -> [(RateKey, f64); 4] {
        [
            (RateKey::BaseFare, self.base_fare),
            (RateKey::RatePerKm, self.rate_per_km),
            (RateKey::RatePerMinute, self.rate_per_minute),
            (RateKey::WaitingChargePerMinute, self.waiting_charge_per_minute),
        ]
    }
}

/// Fare breakdown for a completed ride
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareResult {
    pub base: f64,
    pub distance_fare: f64,
    pub time_fare: f64,
    pub waiting_fare: f64,
    /// Sum of the four components, rounded to cents
    pub total: f64,
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub waiting_minutes: f64,
}

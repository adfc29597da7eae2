use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::location::Coordinates;

/// Driver entity. `available` is true exactly when `active_ride_id` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: i64,
    pub name: String,
    pub location: Coordinates,
    pub available: bool,
    pub active_ride_id: Option<i64>,
    pub cancelled_rides_count: i32,
    pub last_ride_ended_at: Option<DateTime<Utc>>,
}

/// Request to onboard a driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDriver {
    pub name: String,
    pub location: Coordinates,
}

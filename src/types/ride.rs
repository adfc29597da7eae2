//! Ride types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::location::Coordinates;
use super::pricing::FareResult;

/// Ride lifecycle status. Transitions only move forward, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "ride_status", rename_all = "snake_case")]
pub enum RideStatus {
    Pending,
    Assigned,
    DriverArrived,
    InProgress,
    Completed,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Pending => "pending",
            RideStatus::Assigned => "assigned",
            RideStatus::DriverArrived => "driver_arrived",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
        }
    }

    /// The only status this one may move to
    pub fn next(&self) -> Option<RideStatus> {
        match self {
            RideStatus::Pending => Some(RideStatus::Assigned),
            RideStatus::Assigned => Some(RideStatus::DriverArrived),
            RideStatus::DriverArrived => Some(RideStatus::InProgress),
            RideStatus::InProgress => Some(RideStatus::Completed),
            RideStatus::Completed => None,
        }
    }

    pub fn can_transition_to(&self, target: RideStatus) -> bool {
        self.next() == Some(target)
    }
}

/// Ride entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ride {
    pub id: i64,
    pub rider_id: i64,
    pub driver_id: Option<i64>,
    pub pickup: Coordinates,
    pub dropoff: Coordinates,
    pub status: RideStatus,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub driver_arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Straight-line trip distance; fixed once set to a non-zero value
    pub distance_km: Option<f64>,
    pub fare: Option<f64>,
    pub fare_breakdown: Option<FareResult>,
}

/// Request to create a ride in `pending` state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRide {
    pub rider_id: i64,
    pub pickup: Coordinates,
    pub dropoff: Coordinates,
    pub created_at: DateTime<Utc>,
    /// Precomputed distance, if the caller already knows it
    #[serde(default)]
    pub distance_km: Option<f64>,
}

/// Ride intake payload (timestamp defaults to now)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRideRequest {
    pub rider_id: i64,
    pub pickup: Coordinates,
    pub dropoff: Coordinates,
}

/// Lifecycle events reported by the ride-lifecycle driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideEvent {
    Arrived,
    Start,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRideRequest {
    pub ride_id: i64,
    pub event: RideEvent,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

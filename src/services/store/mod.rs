//! Persistence collaborator for the dispatch core
//!
//! Uses Postgres in production, an in-memory store for tests and simulation.

mod memory;
mod postgres;

pub use memory::{FailPoint, InMemoryDispatchStore};
pub use postgres::PgDispatchStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Assignment, Driver, NewDriver, NewRide, NewRider, Ride, RideStatus, Rider};

/// Lookup of completed rides for the recent-pairing rule
#[async_trait]
pub trait RideHistory: Send + Sync {
    /// Most recent completed ride between this driver and rider that ended after `since`
    async fn find_recent_completed_ride(
        &self,
        driver_id: i64,
        rider_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Option<Ride>>;
}

/// Store abstraction over rides, drivers and riders
#[async_trait]
pub trait DispatchStore: RideHistory {
    /// Rides in `pending` status, oldest first
    async fn list_pending_rides(&self) -> Result<Vec<Ride>>;

    /// Drivers with `available = true`
    async fn list_available_drivers(&self) -> Result<Vec<Driver>>;

    /// Apply every assignment of a pass atomically: each ride becomes `assigned`
    /// with its driver and timestamp, each driver becomes unavailable with the
    /// ride as its active ride. Nothing is written if any ride or driver was
    /// already claimed.
    async fn commit_assignments(&self, assignments: &[Assignment]) -> Result<()>;

    async fn get_ride(&self, ride_id: i64) -> Result<Option<Ride>>;

    /// Persist a one-step status transition with its timestamps, only if the
    /// stored status is still `from`
    async fn advance_ride(&self, ride: &Ride, from: RideStatus) -> Result<()>;

    /// Atomically mark an in-progress ride completed with its distance, fare and
    /// breakdown, and hand its driver back to the pool. Only a driver whose active
    /// ride is this ride is released; returns false when there is none.
    async fn persist_completion(&self, ride: &Ride) -> Result<bool>;

    async fn insert_rider(&self, rider: NewRider) -> Result<Rider>;

    async fn insert_driver(&self, driver: NewDriver) -> Result<Driver>;

    async fn insert_ride(&self, ride: NewRide) -> Result<Ride>;

    async fn get_rider(&self, rider_id: i64) -> Result<Option<Rider>>;

    async fn list_rides(&self) -> Result<Vec<Ride>>;

    async fn list_drivers(&self) -> Result<Vec<Driver>>;

    async fn list_riders(&self) -> Result<Vec<Rider>>;

    /// Get store name for logging
    fn name(&self) -> &str;
}

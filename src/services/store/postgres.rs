use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{DispatchStore, RideHistory};
use crate::db::queries;
use crate::error::Result;
use crate::types::{Assignment, Driver, NewDriver, NewRide, NewRider, Ride, RideStatus, Rider};

/// Postgres-backed store
#[derive(Clone)]
pub struct PgDispatchStore {
    pool: PgPool,
}

impl PgDispatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RideHistory for PgDispatchStore {
    async fn find_recent_completed_ride(
        &self,
        driver_id: i64,
        rider_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Option<Ride>> {
        queries::ride::find_recent_completed_ride(&self.pool, driver_id, rider_id, since).await
    }
}

#[async_trait]
impl DispatchStore for PgDispatchStore {
    async fn list_pending_rides(&self) -> Result<Vec<Ride>> {
        queries::ride::list_pending_rides(&self.pool).await
    }

    async fn list_available_drivers(&self) -> Result<Vec<Driver>> {
        queries::driver::list_available_drivers(&self.pool).await
    }

    async fn commit_assignments(&self, assignments: &[Assignment]) -> Result<()> {
        queries::ride::commit_assignments(&self.pool, assignments).await
    }

    async fn get_ride(&self, ride_id: i64) -> Result<Option<Ride>> {
        queries::ride::get_ride(&self.pool, ride_id).await
    }

    async fn advance_ride(&self, ride: &Ride, from: RideStatus) -> Result<()> {
        queries::ride::advance_ride(&self.pool, ride, from).await
    }

    async fn persist_completion(&self, ride: &Ride) -> Result<bool> {
        queries::ride::persist_completion(&self.pool, ride).await
    }

    async fn insert_rider(&self, rider: NewRider) -> Result<Rider> {
        queries::rider::insert_rider(&self.pool, rider).await
    }

    async fn insert_driver(&self, driver: NewDriver) -> Result<Driver> {
        queries::driver::insert_driver(&self.pool, driver).await
    }

    async fn insert_ride(&self, ride: NewRide) -> Result<Ride> {
        queries::ride::insert_ride(&self.pool, ride).await
    }

    async fn get_rider(&self, rider_id: i64) -> Result<Option<Rider>> {
        queries::rider::get_rider(&self.pool, rider_id).await
    }

    async fn list_rides(&self) -> Result<Vec<Ride>> {
        queries::ride::list_rides(&self.pool).await
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>> {
        queries::driver::list_drivers(&self.pool).await
    }

    async fn list_riders(&self) -> Result<Vec<Rider>> {
        queries::rider::list_riders(&self.pool).await
    }

    fn name(&self) -> &str {
        "Postgres"
    }
}

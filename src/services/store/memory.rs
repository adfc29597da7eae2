use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{DispatchStore, RideHistory};
use crate::error::{DispatchError, Result};
use crate::types::{Assignment, Driver, NewDriver, NewRide, NewRider, Ride, RideStatus, Rider};

/// Store operations that can be made to fail in tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    ListPendingRides,
    ListAvailableDrivers,
    RideHistory,
    CommitAssignments,
    PersistFareResult,
    ReleaseDriver,
}

#[derive(Default)]
struct MemoryState {
    riders: BTreeMap<i64, Rider>,
    drivers: BTreeMap<i64, Driver>,
    rides: BTreeMap<i64, Ride>,
    next_id: i64,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory store for tests and simulation runs.
/// Every operation holds the lock for its whole duration, so each call is atomic.
#[derive(Default)]
pub struct InMemoryDispatchStore {
    state: Mutex<MemoryState>,
    fail_point: Mutex<Option<FailPoint>>,
}

impl InMemoryDispatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    /// Make the given operation return `DataAccess` until cleared
    pub fn fail_on(&self, point: FailPoint) {
        *self.fail_point.lock() = Some(point);
    }

    #[cfg(test)]
    pub fn clear_failure(&self) {
        *self.fail_point.lock() = None;
    }

    #[cfg(test)]
    /// Insert or overwrite a driver as-is (keeps the given id)
    pub fn put_driver(&self, driver: Driver) {
        let mut state = self.state.lock();
        state.next_id = state.next_id.max(driver.id);
        state.drivers.insert(driver.id, driver);
    }

    #[cfg(test)]
    /// Insert or overwrite a ride as-is (keeps the given id)
    pub fn put_ride(&self, ride: Ride) {
        let mut state = self.state.lock();
        state.next_id = state.next_id.max(ride.id);
        state.rides.insert(ride.id, ride);
    }

    #[cfg(test)]
    /// Insert or overwrite a rider as-is (keeps the given id)
    pub fn put_rider(&self, rider: Rider) {
        let mut state = self.state.lock();
        state.next_id = state.next_id.max(rider.id);
        state.riders.insert(rider.id, rider);
    }

    pub fn ride(&self, ride_id: i64) -> Option<Ride> {
        self.state.lock().rides.get(&ride_id).cloned()
    }

    #[cfg(test)]
    pub fn driver(&self, driver_id: i64) -> Option<Driver> {
        self.state.lock().drivers.get(&driver_id).cloned()
    }

    fn check(&self, point: FailPoint) -> Result<()> {
        if *self.fail_point.lock() == Some(point) {
            return Err(DispatchError::DataAccess(format!(
                "injected failure at {:?}",
                point
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RideHistory for InMemoryDispatchStore {
    async fn find_recent_completed_ride(
        &self,
        driver_id: i64,
        rider_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Option<Ride>> {
        self.check(FailPoint::RideHistory)?;
        let state = self.state.lock();
        Ok(state
            .rides
            .values()
            .filter(|r| {
                r.driver_id == Some(driver_id)
                    && r.rider_id == rider_id
                    && r.status == RideStatus::Completed
                    && r.ended_at.map_or(false, |ended| ended > since)
            })
            .max_by_key(|r| r.ended_at)
            .cloned())
    }
}

#[async_trait]
impl DispatchStore for InMemoryDispatchStore {
    async fn list_pending_rides(&self) -> Result<Vec<Ride>> {
        self.check(FailPoint::ListPendingRides)?;
        let state = self.state.lock();
        let mut rides: Vec<Ride> = state
            .rides
            .values()
            .filter(|r| r.status == RideStatus::Pending)
            .cloned()
            .collect();
        rides.sort_by_key(|r| (r.created_at, r.id));
        Ok(rides)
    }

    async fn list_available_drivers(&self) -> Result<Vec<Driver>> {
        self.check(FailPoint::ListAvailableDrivers)?;
        let state = self.state.lock();
        Ok(state.drivers.values().filter(|d| d.available).cloned().collect())
    }

    async fn commit_assignments(&self, assignments: &[Assignment]) -> Result<()> {
        self.check(FailPoint::CommitAssignments)?;
        let mut state = self.state.lock();

        // Validate everything before touching anything
        for a in assignments {
            let ride_ok = state
                .rides
                .get(&a.ride_id)
                .map_or(false, |r| r.status == RideStatus::Pending && r.driver_id.is_none());
            let driver_ok = state
                .drivers
                .get(&a.driver_id)
                .map_or(false, |d| d.available && d.active_ride_id.is_none());
            let driver_repeated = assignments
                .iter()
                .filter(|other| other.driver_id == a.driver_id)
                .count()
                > 1;
            if !ride_ok || !driver_ok || driver_repeated {
                return Err(DispatchError::AssignmentConflict {
                    ride_id: a.ride_id,
                    driver_id: a.driver_id,
                });
            }
        }

        for a in assignments {
            if let Some(ride) = state.rides.get_mut(&a.ride_id) {
                ride.status = RideStatus::Assigned;
                ride.driver_id = Some(a.driver_id);
                ride.assigned_at = Some(a.assigned_at);
            }
            if let Some(driver) = state.drivers.get_mut(&a.driver_id) {
                driver.available = false;
                driver.active_ride_id = Some(a.ride_id);
            }
        }
        Ok(())
    }

    async fn get_ride(&self, ride_id: i64) -> Result<Option<Ride>> {
        Ok(self.ride(ride_id))
    }

    async fn advance_ride(&self, ride: &Ride, from: RideStatus) -> Result<()> {
        let mut state = self.state.lock();
        let stored = state
            .rides
            .get_mut(&ride.id)
            .ok_or(DispatchError::NotFound { entity: "ride", id: ride.id })?;
        if stored.status != from {
            return Err(DispatchError::invalid_state(
                ride.id,
                format!("expected status {}, found {}", from.as_str(), stored.status.as_str()),
            ));
        }
        stored.status = ride.status;
        stored.driver_arrived_at = ride.driver_arrived_at;
        stored.started_at = ride.started_at;
        stored.ended_at = ride.ended_at;
        Ok(())
    }

    async fn persist_completion(&self, ride: &Ride) -> Result<bool> {
        self.check(FailPoint::PersistFareResult)?;
        self.check(FailPoint::ReleaseDriver)?;
        let mut state = self.state.lock();
        let stored = state
            .rides
            .get_mut(&ride.id)
            .ok_or(DispatchError::NotFound { entity: "ride", id: ride.id })?;
        if stored.status != RideStatus::InProgress {
            return Err(DispatchError::invalid_state(
                ride.id,
                format!("cannot complete a ride in status {}", stored.status.as_str()),
            ));
        }
        stored.status = RideStatus::Completed;
        stored.ended_at = ride.ended_at;
        stored.distance_km = ride.distance_km;
        stored.fare = ride.fare;
        stored.fare_breakdown = ride.fare_breakdown;

        let driver = ride
            .driver_id
            .and_then(|id| state.drivers.get_mut(&id))
            .filter(|d| d.active_ride_id == Some(ride.id));
        match driver {
            Some(driver) => {
                driver.available = true;
                driver.active_ride_id = None;
                driver.last_ride_ended_at = ride.ended_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_rider(&self, rider: NewRider) -> Result<Rider> {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        let rider = Rider {
            id,
            name: rider.name,
            home: rider.home,
        };
        state.riders.insert(id, rider.clone());
        Ok(rider)
    }

    async fn insert_driver(&self, driver: NewDriver) -> Result<Driver> {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        let driver = Driver {
            id,
            name: driver.name,
            location: driver.location,
            available: true,
            active_ride_id: None,
            cancelled_rides_count: 0,
            last_ride_ended_at: None,
        };
        state.drivers.insert(id, driver.clone());
        Ok(driver)
    }

    async fn insert_ride(&self, ride: NewRide) -> Result<Ride> {
        let mut state = self.state.lock();
        let id = state.allocate_id();
        let ride = Ride {
            id,
            rider_id: ride.rider_id,
            driver_id: None,
            pickup: ride.pickup,
            dropoff: ride.dropoff,
            status: RideStatus::Pending,
            created_at: ride.created_at,
            assigned_at: None,
            driver_arrived_at: None,
            started_at: None,
            ended_at: None,
            distance_km: ride.distance_km,
            fare: None,
            fare_breakdown: None,
        };
        state.rides.insert(id, ride.clone());
        Ok(ride)
    }

    async fn get_rider(&self, rider_id: i64) -> Result<Option<Rider>> {
        Ok(self.state.lock().riders.get(&rider_id).cloned())
    }

    async fn list_rides(&self) -> Result<Vec<Ride>> {
        Ok(self.state.lock().rides.values().cloned().collect())
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>> {
        Ok(self.state.lock().drivers.values().cloned().collect())
    }

    async fn list_riders(&self) -> Result<Vec<Rider>> {
        Ok(self.state.lock().riders.values().cloned().collect())
    }

    fn name(&self) -> &str {
        "InMemory"
    }
}

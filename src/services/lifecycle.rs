//! Ride lifecycle after assignment
//!
//! Moves a ride through `assigned -> driver_arrived -> in_progress -> completed`,
//! pricing it at the last step and handing the driver back to the pool.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{DispatchError, Result};
use crate::services::fare::FareCalculator;
use crate::services::store::DispatchStore;
use crate::types::{Coordinates, FareResult, NewRide, Ride, RideStatus};

/// Result of completing a ride
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
    pub ride: Ride,
    pub fare: FareResult,
    /// False when the assigned driver no longer exists
    pub driver_released: bool,
}

pub struct RideLifecycle {
    store: Arc<dyn DispatchStore>,
    fares: FareCalculator,
}

impl RideLifecycle {
    pub fn new(store: Arc<dyn DispatchStore>, fares: FareCalculator) -> Self {
        Self { store, fares }
    }

    /// Create a pending ride for an existing rider
    pub async fn request_ride(
        &self,
        rider_id: i64,
        pickup: Coordinates,
        dropoff: Coordinates,
        at: DateTime<Utc>,
    ) -> Result<Ride> {
        if self.store.get_rider(rider_id).await?.is_none() {
            return Err(DispatchError::NotFound { entity: "rider", id: rider_id });
        }
        let ride = self
            .store
            .insert_ride(NewRide {
                rider_id,
                pickup,
                dropoff,
                created_at: at,
                distance_km: None,
            })
            .await?;
        info!("Ride {} requested by rider {}", ride.id, rider_id);
        Ok(ride)
    }

    pub async fn mark_driver_arrived(&self, ride_id: i64, at: DateTime<Utc>) -> Result<Ride> {
        self.advance(ride_id, RideStatus::DriverArrived, |ride| {
            ride.driver_arrived_at = Some(at)
        })
        .await
    }

    pub async fn start_ride(&self, ride_id: i64, at: DateTime<Utc>) -> Result<Ride> {
        self.advance(ride_id, RideStatus::InProgress, |ride| ride.started_at = Some(at))
            .await
    }

    /// Finish the ride, price it and release its driver.
    ///
    /// The fare and the driver release are written together, so a failed write
    /// leaves the ride in progress and can be retried. A driver that no longer
    /// holds this ride does not fail the completion.
    pub async fn complete_ride(&self, ride_id: i64, at: DateTime<Utc>) -> Result<CompletionOutcome> {
        let mut ride = self.load_for(ride_id, RideStatus::Completed).await?;
        ride.status = RideStatus::Completed;
        ride.ended_at = Some(at);

        let fare = self.fares.compute(&mut ride).await?;
        let driver_released = self.store.persist_completion(&ride).await?;

        if !driver_released {
            match ride.driver_id {
                Some(driver_id) => {
                    let missing = DispatchError::NotFound { entity: "driver", id: driver_id };
                    warn!("Ride {} completed but driver state was not updated: {}", ride_id, missing);
                }
                None => warn!("Ride {} completed without an assigned driver", ride_id),
            }
        }

        info!("Ride {} completed, fare {:.2}", ride_id, fare.total);
        Ok(CompletionOutcome {
            ride,
            fare,
            driver_released,
        })
    }

    async fn advance<F>(&self, ride_id: i64, target: RideStatus, stamp: F) -> Result<Ride>
    where
        F: FnOnce(&mut Ride),
    {
        let mut ride = self.load_for(ride_id, target).await?;
        let from = ride.status;
        ride.status = target;
        stamp(&mut ride);
        self.store.advance_ride(&ride, from).await?;
        info!("Ride {} moved from {} to {}", ride_id, from.as_str(), target.as_str());
        Ok(ride)
    }

    /// Load a ride that may legally move to `target`
    async fn load_for(&self, ride_id: i64, target: RideStatus) -> Result<Ride> {
        let ride = self
            .store
            .get_ride(ride_id)
            .await?
            .ok_or(DispatchError::NotFound { entity: "ride", id: ride_id })?;
        if !ride.status.can_transition_to(target) {
            return Err(DispatchError::invalid_state(
                ride_id,
                format!("cannot move from {} to {}", ride.status.as_str(), target.as_str()),
            ));
        }
        Ok(ride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rates::InMemoryRateTable;
    use crate::services::store::{FailPoint, InMemoryDispatchStore};
    use crate::types::{Assignment, Driver, Rider};
    use chrono::Duration;

    fn setup() -> (Arc<InMemoryDispatchStore>, RideLifecycle) {
        let store = Arc::new(InMemoryDispatchStore::new());
        let fares = FareCalculator::new(Arc::new(InMemoryRateTable::with_defaults()));
        let dyn_store: Arc<dyn DispatchStore> = store.clone();
        (store, RideLifecycle::new(dyn_store, fares))
    }

    fn rider(id: i64) -> Rider {
        Rider {
            id,
            name: format!("Rider{}", id),
            home: Coordinates::new(12.9716, 77.5946),
        }
    }

    fn driver(id: i64) -> Driver {
        Driver {
            id,
            name: format!("Driver{}", id),
            location: Coordinates::new(12.975, 77.59),
            available: true,
            active_ride_id: None,
            cancelled_rides_count: 0,
            last_ride_ended_at: None,
        }
    }

    async fn assigned_ride(store: &InMemoryDispatchStore, lifecycle: &RideLifecycle, at: DateTime<Utc>) -> Ride {
        store.put_rider(rider(1));
        store.put_driver(driver(2));
        let ride = lifecycle
            .request_ride(1, Coordinates::new(12.9716, 77.5946), Coordinates::new(12.9716, 77.6046), at)
            .await
            .unwrap();
        store
            .commit_assignments(&[Assignment {
                ride_id: ride.id,
                driver_id: 2,
                assigned_at: at,
                distance_km: 0.4,
                radius_km: 2.0,
            }])
            .await
            .unwrap();
        store.ride(ride.id).unwrap()
    }

    #[tokio::test]
    async fn full_lifecycle_prices_ride_and_frees_driver() {
        let (store, lifecycle) = setup();
        let t0 = Utc::now();
        let ride = assigned_ride(&store, &lifecycle, t0).await;

        lifecycle.mark_driver_arrived(ride.id, t0 + Duration::minutes(4)).await.unwrap();
        lifecycle.start_ride(ride.id, t0 + Duration::minutes(6)).await.unwrap();
        let outcome = lifecycle
            .complete_ride(ride.id, t0 + Duration::minutes(16))
            .await
            .unwrap();

        assert!(outcome.driver_released);
        assert_eq!(outcome.fare.waiting_minutes, 2.0);
        assert_eq!(outcome.fare.duration_minutes, 10.0);

        let stored = store.ride(ride.id).unwrap();
        assert_eq!(stored.status, RideStatus::Completed);
        assert_eq!(stored.fare, Some(outcome.fare.total));
        assert!(stored.distance_km.is_some());

        let freed = store.driver(2).unwrap();
        assert!(freed.available);
        assert_eq!(freed.active_ride_id, None);
        assert_eq!(freed.last_ride_ended_at, Some(t0 + Duration::minutes(16)));
    }

    #[tokio::test]
    async fn steps_cannot_be_skipped() {
        let (store, lifecycle) = setup();
        let ride = assigned_ride(&store, &lifecycle, Utc::now()).await;

        let err = lifecycle.start_ride(ride.id, Utc::now()).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
        let err = lifecycle.complete_ride(ride.id, Utc::now()).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
        assert_eq!(store.ride(ride.id).unwrap().status, RideStatus::Assigned);
    }

    #[tokio::test]
    async fn unknown_ride_and_rider_are_not_found() {
        let (_store, lifecycle) = setup();
        let err = lifecycle.mark_driver_arrived(404, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { entity: "ride", id: 404 }));

        let err = lifecycle
            .request_ride(9, Coordinates::new(0.0, 0.0), Coordinates::new(0.1, 0.1), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { entity: "rider", id: 9 }));
    }

    #[tokio::test]
    async fn vanished_driver_does_not_fail_completion() {
        let (store, lifecycle) = setup();
        let t0 = Utc::now();
        let ride = assigned_ride(&store, &lifecycle, t0).await;
        lifecycle.mark_driver_arrived(ride.id, t0).await.unwrap();
        lifecycle.start_ride(ride.id, t0).await.unwrap();

        let mut orphan = store.ride(ride.id).unwrap();
        orphan.driver_id = Some(777);
        store.put_ride(orphan);

        let outcome = lifecycle.complete_ride(ride.id, t0 + Duration::minutes(5)).await.unwrap();
        assert!(!outcome.driver_released);
        assert_eq!(store.ride(ride.id).unwrap().status, RideStatus::Completed);
    }

    #[tokio::test]
    async fn failed_fare_write_keeps_ride_in_progress() {
        let (store, lifecycle) = setup();
        let t0 = Utc::now();
        let ride = assigned_ride(&store, &lifecycle, t0).await;
        lifecycle.mark_driver_arrived(ride.id, t0).await.unwrap();
        lifecycle.start_ride(ride.id, t0).await.unwrap();
        store.fail_on(FailPoint::PersistFareResult);

        let err = lifecycle.complete_ride(ride.id, t0 + Duration::minutes(5)).await.unwrap_err();
        assert!(err.is_data_access());
        assert_eq!(store.ride(ride.id).unwrap().status, RideStatus::InProgress);
        assert!(!store.driver(2).unwrap().available);
    }

    #[tokio::test]
    async fn failed_driver_release_leaves_both_untouched_and_retries() {
        let (store, lifecycle) = setup();
        let t0 = Utc::now();
        let ride = assigned_ride(&store, &lifecycle, t0).await;
        lifecycle.mark_driver_arrived(ride.id, t0).await.unwrap();
        lifecycle.start_ride(ride.id, t0).await.unwrap();
        store.fail_on(FailPoint::ReleaseDriver);

        let err = lifecycle.complete_ride(ride.id, t0 + Duration::minutes(5)).await.unwrap_err();
        assert!(err.is_data_access());
        let stored = store.ride(ride.id).unwrap();
        assert_eq!(stored.status, RideStatus::InProgress);
        assert!(stored.fare.is_none());
        let held = store.driver(2).unwrap();
        assert!(!held.available);
        assert_eq!(held.active_ride_id, Some(ride.id));

        store.clear_failure();
        let outcome = lifecycle.complete_ride(ride.id, t0 + Duration::minutes(6)).await.unwrap();
        assert!(outcome.driver_released);
        assert_eq!(store.ride(ride.id).unwrap().status, RideStatus::Completed);
        let freed = store.driver(2).unwrap();
        assert!(freed.available);
        assert_eq!(freed.active_ride_id, None);
    }

    #[tokio::test]
    async fn driver_holding_another_ride_is_not_released() {
        let (store, lifecycle) = setup();
        let t0 = Utc::now();
        let ride = assigned_ride(&store, &lifecycle, t0).await;
        lifecycle.mark_driver_arrived(ride.id, t0).await.unwrap();
        lifecycle.start_ride(ride.id, t0).await.unwrap();

        let mut busy = store.driver(2).unwrap();
        busy.active_ride_id = Some(ride.id + 100);
        store.put_driver(busy);

        let outcome = lifecycle.complete_ride(ride.id, t0 + Duration::minutes(5)).await.unwrap();
        assert!(!outcome.driver_released);
        assert_eq!(store.ride(ride.id).unwrap().status, RideStatus::Completed);
        let untouched = store.driver(2).unwrap();
        assert!(!untouched.available);
        assert_eq!(untouched.active_ride_id, Some(ride.id + 100));
        assert_eq!(untouched.last_ride_ended_at, None);
    }
}

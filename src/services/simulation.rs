//! End-to-end dispatch simulation
//!
//! Seeds riders and drivers around a city center, generates ride requests over
//! a number of simulated days, then alternates allocation passes with driving
//! every assigned ride to completion until a pass assigns nothing.

use std::f64::consts::PI;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::services::geo::haversine_distance;
use crate::services::lifecycle::RideLifecycle;
use crate::services::matcher::RideMatcher;
use crate::services::store::DispatchStore;
use crate::services::summary::{summarize, DispatchSummary};
use crate::types::{Coordinates, NewDriver, NewRide, NewRider, Rider};

/// Bangalore
pub const CITY_CENTER: Coordinates = Coordinates { lat: 12.9716, lng: 77.5946 };
const CITY_RADIUS_KM: f64 = 20.0;
const PICKUP_RADIUS_KM: f64 = 5.0;
const DROP_RADIUS_KM: f64 = 10.0;
const AVG_SPEED_KMH: f64 = 30.0;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub seed: u64,
    pub days: u32,
    pub riders: usize,
    pub drivers: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            days: 2,
            riders: 10,
            drivers: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub rides_generated: usize,
    pub passes: usize,
    pub rides_completed: usize,
    pub summary: DispatchSummary,
}

pub struct Simulation {
    store: Arc<dyn DispatchStore>,
    matcher: Arc<RideMatcher>,
    lifecycle: RideLifecycle,
    config: SimulationConfig,
    rng: StdRng,
}

impl Simulation {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        matcher: Arc<RideMatcher>,
        lifecycle: RideLifecycle,
        config: SimulationConfig,
    ) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            store,
            matcher,
            lifecycle,
            config,
            rng,
        }
    }

    /// Run the whole simulation with `start` as the first simulated day
    pub async fn run(&mut self, start: DateTime<Utc>) -> Result<SimulationReport> {
        info!(
            "Starting simulation on {} store: {} days, seed {}",
            self.store.name(),
            self.config.days,
            self.config.seed
        );

        self.seed_users().await?;
        let rides_generated = self.generate_rides(start).await?;

        // Every request exists by the end of the last day
        let mut clock = start + Duration::days(self.config.days as i64);
        let mut passes = 0;
        let mut rides_completed = 0;

        loop {
            let report = self.matcher.run_pass(clock).await?;
            passes += 1;
            if report.rides_assigned == 0 {
                break;
            }

            let mut latest_end = clock;
            for assignment in &report.assignments {
                let ended = self.drive_ride(assignment.ride_id, assignment.assigned_at).await?;
                latest_end = latest_end.max(ended);
                rides_completed += 1;
            }
            clock = latest_end;
        }

        let rides = self.store.list_rides().await?;
        let drivers = self.store.list_drivers().await?;
        let summary = summarize(&rides, &drivers);

        info!(
            "Simulation finished: {} rides generated, {} completed, {} unmatched after {} passes",
            rides_generated, summary.completed_rides, summary.unmatched_rides, passes
        );

        Ok(SimulationReport {
            rides_generated,
            passes,
            rides_completed,
            summary,
        })
    }

    /// Create riders and drivers unless the store already has some
    async fn seed_users(&mut self) -> Result<()> {
        if !self.store.list_riders().await?.is_empty() || !self.store.list_drivers().await?.is_empty() {
            info!("Riders or drivers already exist, skipping user seeding");
            return Ok(());
        }

        for i in 0..self.config.riders {
            let home = random_point_within_km(&mut self.rng, CITY_CENTER, CITY_RADIUS_KM);
            self.store
                .insert_rider(NewRider { name: format!("Rider{}", i + 1), home })
                .await?;
        }
        for i in 0..self.config.drivers {
            let location = random_point_within_km(&mut self.rng, CITY_CENTER, CITY_RADIUS_KM);
            self.store
                .insert_driver(NewDriver { name: format!("Driver{}", i + 1), location })
                .await?;
        }
        info!("Created {} riders and {} drivers", self.config.riders, self.config.drivers);
        Ok(())
    }

    async fn generate_rides(&mut self, start: DateTime<Utc>) -> Result<usize> {
        let riders: Vec<Rider> = self.store.list_riders().await?;
        let mut total = 0;

        for day in 0..self.config.days {
            let mut day_rides = 0;
            for rider in &riders {
                let requests = self.rng.gen_range(1..=2);
                for _ in 0..requests {
                    let pickup = random_point_within_km(&mut self.rng, rider.home, PICKUP_RADIUS_KM);
                    let dropoff = random_point_within_km(&mut self.rng, rider.home, DROP_RADIUS_KM);
                    let distance = (haversine_distance(&pickup, &dropoff) * 100.0).round() / 100.0;
                    let created_at = start
                        + Duration::days(day as i64)
                        + Duration::seconds(self.rng.gen_range(0..=86_400));

                    self.store
                        .insert_ride(NewRide {
                            rider_id: rider.id,
                            pickup,
                            dropoff,
                            created_at,
                            distance_km: Some(distance),
                        })
                        .await?;
                    day_rides += 1;
                }
            }
            info!("Generated {} rides for day {}", day_rides, day + 1);
            total += day_rides;
        }
        Ok(total)
    }

    /// Drive an assigned ride to completion. Returns its end time.
    async fn drive_ride(&mut self, ride_id: i64, assigned_at: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let travel = Duration::minutes(self.rng.gen_range(2..=5));
        let waiting = Duration::minutes(self.rng.gen_range(1..=3));

        let arrived_at = assigned_at + travel;
        let ride = self.lifecycle.mark_driver_arrived(ride_id, arrived_at).await?;

        let started_at = arrived_at + waiting;
        self.lifecycle.start_ride(ride_id, started_at).await?;

        let distance = match ride.distance_km {
            Some(d) if d != 0.0 => d,
            _ => haversine_distance(&ride.pickup, &ride.dropoff),
        };
        let ride_ms = (distance / AVG_SPEED_KMH * 3_600_000.0).round() as i64;
        let ended_at = started_at + Duration::milliseconds(ride_ms);

        let outcome = self.lifecycle.complete_ride(ride_id, ended_at).await?;
        debug!(
            "Ride {} simulated: {:.2} km, fare {:.2}, driver released: {}",
            ride_id, distance, outcome.fare.total, outcome.driver_released
        );
        Ok(ended_at)
    }
}

/// Uniform random point within `radius_km` of `center` (flat-earth offset)
pub fn random_point_within_km<R: Rng>(rng: &mut R, center: Coordinates, radius_km: f64) -> Coordinates {
    let r = rng.gen::<f64>().sqrt() * radius_km;
    let theta = rng.gen::<f64>() * 2.0 * PI;
    let dlat = r * theta.sin() / 111.0;
    let dlng = r * theta.cos() / (111.0 * center.lat.to_radians().cos());
    Coordinates::new(center.lat + dlat, center.lng + dlng)
}

//! Driver allocation pass
//!
//! Pending rides are processed oldest first. For each ride the search radius
//! starts at one step and grows by a step until an eligible driver is found or
//! the maximum radius is passed; the nearest eligible driver wins, ties going
//! to the lowest driver id. Assignments are collected during the scan and
//! committed together at the end, so a failure anywhere in the pass leaves
//! the store untouched and the rides are retried on the next tick.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::defaults::{
    DEFAULT_MAX_CANCELLED_RIDES, DEFAULT_MAX_SEARCH_RADIUS_KM,
    DEFAULT_RECENT_PAIRING_COOLDOWN_MINUTES, DEFAULT_SEARCH_RADIUS_STEP_KM,
};
use crate::error::Result;
use crate::services::eligibility::{Eligibility, EligibilityFilter, Screening};
use crate::services::store::DispatchStore;
use crate::types::{AllocationReport, Assignment, Driver, ExclusionTally, Ride};

/// Matching parameters
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    pub radius_step_km: f64,
    pub max_radius_km: f64,
    pub cooldown_minutes: i64,
    pub max_cancelled_rides: i32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            radius_step_km: DEFAULT_SEARCH_RADIUS_STEP_KM,
            max_radius_km: DEFAULT_MAX_SEARCH_RADIUS_KM,
            cooldown_minutes: DEFAULT_RECENT_PAIRING_COOLDOWN_MINUTES,
            max_cancelled_rides: DEFAULT_MAX_CANCELLED_RIDES,
        }
    }
}

impl MatchingConfig {
    /// Search radii in the order they are tried: step, 2*step, ... up to the maximum
    pub fn radii(&self) -> Vec<f64> {
        if !(self.radius_step_km > 0.0) || !(self.max_radius_km >= self.radius_step_km) {
            return Vec::new();
        }
        let steps = (self.max_radius_km / self.radius_step_km).floor() as u32;
        (1..=steps).map(|k| k as f64 * self.radius_step_km).collect()
    }
}

/// The driver chosen for one ride
#[derive(Debug, Clone, Copy, PartialEq)]
struct Selection {
    driver_id: i64,
    distance_km: f64,
    radius_km: f64,
}

/// Result of the radius search for one ride
#[derive(Debug, Clone, PartialEq)]
struct RideMatch {
    selection: Option<Selection>,
    /// Exclusions counted at the last radius scanned
    exclusions: ExclusionTally,
}

pub struct RideMatcher {
    store: Arc<dyn DispatchStore>,
    filter: EligibilityFilter,
    config: MatchingConfig,
}

impl RideMatcher {
    pub fn new(store: Arc<dyn DispatchStore>, config: MatchingConfig) -> Self {
        let filter = EligibilityFilter::new(
            Duration::minutes(config.cooldown_minutes),
            config.max_cancelled_rides,
        );
        Self {
            store,
            filter,
            config,
        }
    }

    /// Run one allocation pass over all pending rides.
    ///
    /// Callers must not run two passes concurrently against the same store;
    /// the scheduler enforces this with a single-flight lock.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<AllocationReport> {
        let mut report = AllocationReport::new(now);

        let mut rides = self.store.list_pending_rides().await?;
        rides.sort_by_key(|r| (r.created_at, r.id));
        info!("Pass {}: found {} unassigned rides", report.pass_id, rides.len());

        let mut pool = self.store.list_available_drivers().await?;
        pool.sort_by_key(|d| d.id);

        let mut pending: Vec<Assignment> = Vec::new();

        for ride in &rides {
            report.rides_scanned += 1;
            debug!(
                "Processing ride {} - pickup ({:.4}, {:.4}), rider {}",
                ride.id, ride.pickup.lat, ride.pickup.lng, ride.rider_id
            );

            let found = self.match_ride(ride, &pool, now).await?;
            report.exclusions.merge(&found.exclusions);

            match found.selection {
                Some(selection) => {
                    info!(
                        "Selected driver {} at {:.2} km (radius {} km) for ride {}",
                        selection.driver_id, selection.distance_km, selection.radius_km, ride.id
                    );
                    pool.retain(|d| d.id != selection.driver_id);
                    pending.push(Assignment {
                        ride_id: ride.id,
                        driver_id: selection.driver_id,
                        assigned_at: now,
                        distance_km: selection.distance_km,
                        radius_km: selection.radius_km,
                    });
                    report.rides_assigned += 1;
                }
                None => {
                    warn!(
                        "No eligible driver found for ride {} within maximum radius of {} km",
                        ride.id, self.config.max_radius_km
                    );
                    report.rides_unmatched += 1;
                    report.unmatched_ride_ids.push(ride.id);
                }
            }
        }

        if !pending.is_empty() {
            self.store.commit_assignments(&pending).await?;
        }
        report.assignments = pending;

        info!(
            "Pass {} complete: {} scanned, {} assigned, {} unmatched",
            report.pass_id, report.rides_scanned, report.rides_assigned, report.rides_unmatched
        );
        Ok(report)
    }

    async fn match_ride(&self, ride: &Ride, pool: &[Driver], now: DateTime<Utc>) -> Result<RideMatch> {
        if pool.is_empty() {
            return Ok(RideMatch {
                selection: None,
                exclusions: ExclusionTally::default(),
            });
        }

        let mut screened: Vec<(i64, Screening)> = Vec::with_capacity(pool.len());
        for driver in pool {
            let screening = self.filter.screen(ride, driver, now, self.store.as_ref()).await?;
            screened.push((driver.id, screening));
        }

        let mut exclusions = ExclusionTally::default();
        for radius_km in self.config.radii() {
            exclusions = ExclusionTally::default();
            let mut best: Option<Selection> = None;

            for (driver_id, screening) in &screened {
                match screening.at_radius(radius_km) {
                    Eligibility::Eligible { distance_km } => {
                        let better = match &best {
                            None => true,
                            Some(b) => distance_km
                                .total_cmp(&b.distance_km)
                                .then(driver_id.cmp(&b.driver_id))
                                .is_lt(),
                        };
                        if better {
                            best = Some(Selection {
                                driver_id: *driver_id,
                                distance_km,
                                radius_km,
                            });
                        }
                    }
                    Eligibility::Excluded(reason) => exclusions.record(reason),
                }
            }

            debug!(
                "Ride {} - radius {} km - exclusion stats: {:?}",
                ride.id, radius_km, exclusions
            );

            if best.is_some() {
                return Ok(RideMatch {
                    selection: best,
                    exclusions,
                });
            }
        }

        Ok(RideMatch {
            selection: None,
            exclusions,
        })
    }
}

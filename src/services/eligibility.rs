//! Driver eligibility rules for a ride
//!
//! Rules are evaluated in a fixed order and the first one that applies wins:
//! 1. the driver already has an active ride
//! 2. the driver completed a ride with the same rider within the cooldown window
//! 3. the driver has reached the cancellation threshold
//! 4. the driver is farther from the pickup than the current search radius
//!
//! Rules 1-3 do not depend on the radius, so the matcher screens each driver
//! once per ride and re-applies only the range rule as the radius grows.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::Result;
use crate::services::geo::haversine_distance;
use crate::services::store::RideHistory;
use crate::types::{Driver, ExclusionReason, Ride};

/// Outcome of the full rule set at one radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eligibility {
    Eligible { distance_km: f64 },
    Excluded(ExclusionReason),
}

impl Eligibility {
    #[cfg(test)]
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible { .. })
    }

    #[cfg(test)]
    pub fn reason(&self) -> Option<ExclusionReason> {
        match self {
            Eligibility::Eligible { .. } => None,
            Eligibility::Excluded(reason) => Some(*reason),
        }
    }
}

/// Outcome of the radius-independent rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Screening {
    Blocked(ExclusionReason),
    Clear { distance_km: f64 },
}

impl Screening {
    /// Apply the range rule. Drivers exactly on the boundary are in range.
    pub fn at_radius(&self, radius_km: f64) -> Eligibility {
        match *self {
            Screening::Blocked(reason) => Eligibility::Excluded(reason),
            Screening::Clear { distance_km } if distance_km <= radius_km => {
                Eligibility::Eligible { distance_km }
            }
            Screening::Clear { .. } => Eligibility::Excluded(ExclusionReason::OutOfRange),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    cooldown: Duration,
    max_cancelled_rides: i32,
}

impl EligibilityFilter {
    pub fn new(cooldown: Duration, max_cancelled_rides: i32) -> Self {
        Self {
            cooldown,
            max_cancelled_rides,
        }
    }

    #[cfg(test)]
    /// Full rule set for one driver at one radius
    pub async fn check<H>(
        &self,
        ride: &Ride,
        driver: &Driver,
        radius_km: f64,
        now: DateTime<Utc>,
        history: &H,
    ) -> Result<Eligibility>
    where
        H: RideHistory + ?Sized,
    {
        let screening = self.screen(ride, driver, now, history).await?;
        Ok(screening.at_radius(radius_km))
    }

    /// Radius-independent rules, plus the pickup distance for drivers that pass them
    pub async fn screen<H>(
        &self,
        ride: &Ride,
        driver: &Driver,
        now: DateTime<Utc>,
        history: &H,
    ) -> Result<Screening>
    where
        H: RideHistory + ?Sized,
    {
        if let Some(active) = driver.active_ride_id {
            debug!("Driver {} excluded: already has active ride {}", driver.id, active);
            return Ok(Screening::Blocked(ExclusionReason::ActiveRide));
        }

        let since = now - self.cooldown;
        if let Some(recent) = history
            .find_recent_completed_ride(driver.id, ride.rider_id, since)
            .await?
        {
            debug!(
                "Driver {} excluded: recently completed ride {} with rider {}",
                driver.id, recent.id, ride.rider_id
            );
            return Ok(Screening::Blocked(ExclusionReason::RecentPairing));
        }

        if driver.cancelled_rides_count >= self.max_cancelled_rides {
            debug!(
                "Driver {} excluded: has {} cancelled rides",
                driver.id, driver.cancelled_rides_count
            );
            return Ok(Screening::Blocked(ExclusionReason::CancellationPenalty));
        }

        let distance_km = haversine_distance(&driver.location, &ride.pickup);
        debug!("Driver {} is {:.2} km away from pickup of ride {}", driver.id, distance_km, ride.id);
        Ok(Screening::Clear { distance_km })
    }
}

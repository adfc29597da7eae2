//! Fare calculation for completed rides
//!
//! total = base + distance_km * rate_per_km + ride minutes * rate_per_minute
//!       + waiting minutes * waiting_charge_per_minute, rounded to cents.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{DispatchError, Result};
use crate::services::geo::haversine_distance;
use crate::services::rates::{resolve_fare_rates, RateTable};
use crate::types::{FareResult, Ride, RideStatus};

pub struct FareCalculator {
    rates: Arc<dyn RateTable>,
}

impl FareCalculator {
    pub fn new(rates: Arc<dyn RateTable>) -> Self {
        Self { rates }
    }

    /// Compute the fare for a completed ride.
    ///
    /// Fills in `distance_km` if it was never set (zero counts as unset), then
    /// records `fare` and `fare_breakdown` on the ride. Persisting the result is
    /// the caller's job.
    pub async fn compute(&self, ride: &mut Ride) -> Result<FareResult> {
        if ride.status != RideStatus::Completed {
            return Err(DispatchError::invalid_state(
                ride.id,
                format!("fare requested for ride in status {}", ride.status.as_str()),
            ));
        }

        let rates = resolve_fare_rates(self.rates.as_ref()).await?;
        debug!("Ride {} - using rates {:?}", ride.id, rates);
        for (key, value) in rates.named() {
            if !(value >= 0.0) {
                return Err(DispatchError::invalid_state(
                    ride.id,
                    format!("pricing rate {} is negative ({})", key.as_str(), value),
                ));
            }
        }

        let distance_km = match ride.distance_km {
            Some(cached) if cached != 0.0 => cached,
            _ => {
                let computed = haversine_distance(&ride.pickup, &ride.dropoff);
                ride.distance_km = Some(computed);
                computed
            }
        };
        if distance_km < 0.0 {
            return Err(DispatchError::invalid_state(
                ride.id,
                format!("negative distance {} km", distance_km),
            ));
        }

        let duration_minutes = minutes_between(ride.id, "ride", ride.started_at, ride.ended_at)?;
        let waiting_minutes =
            minutes_between(ride.id, "waiting", ride.driver_arrived_at, ride.started_at)?;

        let base = rates.base_fare;
        let distance_fare = distance_km * rates.rate_per_km;
        let time_fare = duration_minutes * rates.rate_per_minute;
        let waiting_fare = waiting_minutes * rates.waiting_charge_per_minute;
        let total = round_to_cents(base + distance_fare + time_fare + waiting_fare);

        if !total.is_finite() {
            return Err(DispatchError::invalid_state(ride.id, "fare total is not a finite number"));
        }
        if total < 0.0 {
            return Err(DispatchError::invalid_state(ride.id, format!("fare total {} is negative", total)));
        }

        let result = FareResult {
            base,
            distance_fare,
            time_fare,
            waiting_fare,
            total,
            distance_km,
            duration_minutes,
            waiting_minutes,
        };

        info!(
            "Ride {} fare: base {:.2} + distance {:.2} + time {:.2} + waiting {:.2} = {:.2}",
            ride.id, base, distance_fare, time_fare, waiting_fare, total
        );

        ride.fare = Some(total);
        ride.fare_breakdown = Some(result);
        Ok(result)
    }
}

/// Minutes from `from` to `to`; zero when either is missing
fn minutes_between(
    ride_id: i64,
    what: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<f64> {
    let (Some(from), Some(to)) = (from, to) else {
        return Ok(0.0);
    };
    let minutes = (to - from).num_milliseconds() as f64 / 60_000.0;
    if minutes < 0.0 {
        return Err(DispatchError::invalid_state(
            ride_id,
            format!("{} time is negative ({:.2} min)", what, minutes),
        ));
    }
    Ok(minutes)
}

/// Half away from zero, which is half-up for the non-negative totals we produce
fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rates::InMemoryRateTable;
    use crate::types::Coordinates;
    use chrono::{Duration, TimeZone};

    fn calculator() -> FareCalculator {
        FareCalculator::new(Arc::new(InMemoryRateTable::with_defaults()))
    }

    fn completed_ride(distance_km: Option<f64>, waiting_min: i64, ride_min: i64) -> Ride {
        let arrived = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let started = arrived + Duration::minutes(waiting_min);
        let ended = started + Duration::minutes(ride_min);
        Ride {
            id: 1,
            rider_id: 1,
            driver_id: Some(1),
            pickup: Coordinates::new(12.9716, 77.5946),
            dropoff: Coordinates::new(12.9716, 77.6046),
            status: RideStatus::Completed,
            created_at: arrived - Duration::minutes(10),
            assigned_at: Some(arrived - Duration::minutes(5)),
            driver_arrived_at: Some(arrived),
            started_at: Some(started),
            ended_at: Some(ended),
            distance_km,
            fare: None,
            fare_breakdown: None,
        }
    }

    #[tokio::test]
    async fn test_reference_fare() {
        let mut ride = completed_ride(Some(5.0), 3, 15);
        let fare = calculator().compute(&mut ride).await.unwrap();

        assert_eq!(fare.base, 20.0);
        assert_eq!(fare.distance_fare, 50.0);
        assert_eq!(fare.time_fare, 30.0);
        assert_eq!(fare.waiting_fare, 3.0);
        assert_eq!(fare.total, 103.0);
        assert_eq!(ride.fare, Some(103.0));
        assert_eq!(ride.fare_breakdown, Some(fare));
    }

    #[tokio::test]
    async fn test_compute_is_idempotent() {
        let calc = calculator();
        let mut ride = completed_ride(None, 2, 11);
        let first = calc.compute(&mut ride).await.unwrap();
        let second = calc.compute(&mut ride).await.unwrap();
        assert_eq!(first.total, second.total);
        assert_eq!(first.distance_km, second.distance_km);
    }

    #[tokio::test]
    async fn test_distance_is_computed_once_and_cached() {
        let calc = calculator();
        let mut ride = completed_ride(None, 0, 5);
        calc.compute(&mut ride).await.unwrap();
        let cached = ride.distance_km.unwrap();
        assert!((cached - 1.09).abs() < 0.02);

        // Moving the drop point must not change an already-cached distance
        ride.dropoff = Coordinates::new(13.2, 77.9);
        let again = calc.compute(&mut ride).await.unwrap();
        assert_eq!(ride.distance_km, Some(cached));
        assert_eq!(again.distance_km, cached);
    }

    #[tokio::test]
    async fn test_zero_distance_counts_as_unset() {
        let mut ride = completed_ride(Some(0.0), 0, 5);
        let fare = calculator().compute(&mut ride).await.unwrap();
        assert!(fare.distance_km > 1.0);
        assert_eq!(ride.distance_km, Some(fare.distance_km));
    }

    #[tokio::test]
    async fn test_missing_timestamps_give_zero_minutes() {
        let mut ride = completed_ride(Some(2.0), 3, 15);
        ride.driver_arrived_at = None;
        ride.started_at = None;
        let fare = calculator().compute(&mut ride).await.unwrap();
        assert_eq!(fare.duration_minutes, 0.0);
        assert_eq!(fare.waiting_minutes, 0.0);
        assert_eq!(fare.total, 40.0);
    }

    #[tokio::test]
    async fn test_total_is_at_least_base() {
        let calc = calculator();
        for (distance, waiting, minutes) in [(0.3, 0, 0), (1.0, 1, 1), (12.5, 4, 40)] {
            let mut ride = completed_ride(Some(distance), waiting, minutes);
            let fare = calc.compute(&mut ride).await.unwrap();
            assert!(fare.total >= fare.base);
        }
    }

    #[tokio::test]
    async fn test_total_rounds_to_cents() {
        let table = InMemoryRateTable::with_defaults();
        table.set("rate_per_km", 3.333);
        let calc = FareCalculator::new(Arc::new(table));
        let mut ride = completed_ride(Some(1.0), 0, 0);
        let fare = calc.compute(&mut ride).await.unwrap();
        assert_eq!(fare.total, 23.33);
    }

    #[tokio::test]
    async fn test_end_before_start_is_invalid() {
        let mut ride = completed_ride(Some(5.0), 3, 15);
        ride.ended_at = ride.started_at.map(|s| s - Duration::minutes(1));
        let err = calculator().compute(&mut ride).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidState { ride_id: 1, .. }));
        assert!(ride.fare.is_none());
    }

    #[tokio::test]
    async fn test_negative_cached_distance_is_invalid() {
        let mut ride = completed_ride(Some(-4.0), 3, 15);
        let err = calculator().compute(&mut ride).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn test_negative_rate_is_rejected() {
        let table = InMemoryRateTable::with_defaults();
        table.set("rate_per_km", -100.0);
        let calc = FareCalculator::new(Arc::new(table));
        let mut ride = completed_ride(Some(5.0), 0, 5);

        let err = calc.compute(&mut ride).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidState { ride_id: 1, .. }));
        assert!(ride.fare.is_none());
        assert!(ride.fare_breakdown.is_none());
    }

    #[tokio::test]
    async fn test_only_completed_rides_are_priced() {
        let mut ride = completed_ride(Some(5.0), 3, 15);
        ride.status = RideStatus::InProgress;
        let err = calculator().compute(&mut ride).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
    }
}

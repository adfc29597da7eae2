//! Dispatch metrics

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Driver, Ride, RideStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSummary {
    pub total_rides: usize,
    pub completed_rides: usize,
    pub unmatched_rides: usize,
    pub avg_wait_minutes: f64,
    pub avg_ride_minutes: f64,
    pub drivers: Vec<DriverStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStats {
    pub driver_id: i64,
    pub name: String,
    pub completed_rides: usize,
    pub total_fare: f64,
    pub avg_fare: f64,
    pub cancelled_rides: i32,
    pub avg_wait_minutes: f64,
    pub avg_ride_minutes: f64,
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    fare_sum: f64,
    wait: Vec<f64>,
    duration: Vec<f64>,
}

impl Accumulator {
    fn add(&mut self, ride: &Ride) {
        self.count += 1;
        self.fare_sum += ride.fare.unwrap_or(0.0);
        if let Some(m) = minutes(ride.driver_arrived_at, ride.started_at) {
            self.wait.push(m);
        }
        if let Some(m) = minutes(ride.started_at, ride.ended_at) {
            self.duration.push(m);
        }
    }
}

/// Summarize rides and drivers. Per-driver stats only list drivers with at
/// least one completed ride, ordered by driver id.
pub fn summarize(rides: &[Ride], drivers: &[Driver]) -> DispatchSummary {
    let mut overall = Accumulator::default();
    let mut per_driver: BTreeMap<i64, Accumulator> = BTreeMap::new();

    for ride in rides.iter().filter(|r| r.status == RideStatus::Completed) {
        overall.add(ride);
        if let Some(driver_id) = ride.driver_id {
            per_driver.entry(driver_id).or_default().add(ride);
        }
    }

    let driver_stats = per_driver
        .into_iter()
        .map(|(driver_id, acc)| {
            let driver = drivers.iter().find(|d| d.id == driver_id);
            DriverStats {
                driver_id,
                name: driver.map(|d| d.name.clone()).unwrap_or_default(),
                completed_rides: acc.count,
                total_fare: acc.fare_sum,
                avg_fare: acc.fare_sum / acc.count as f64,
                cancelled_rides: driver.map_or(0, |d| d.cancelled_rides_count),
                avg_wait_minutes: mean(&acc.wait),
                avg_ride_minutes: mean(&acc.duration),
            }
        })
        .collect();

    DispatchSummary {
        total_rides: rides.len(),
        completed_rides: overall.count,
        unmatched_rides: rides.iter().filter(|r| r.status == RideStatus::Pending).count(),
        avg_wait_minutes: mean(&overall.wait),
        avg_ride_minutes: mean(&overall.duration),
        drivers: driver_stats,
    }
}

fn minutes(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Option<f64> {
    Some((to? - from?).num_milliseconds() as f64 / 60_000.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinates;
    use chrono::{Duration, TimeZone};

    fn ride(id: i64, driver_id: Option<i64>, status: RideStatus) -> Ride {
        Ride {
            id,
            rider_id: 1,
            driver_id,
            pickup: Coordinates::new(12.97, 77.59),
            dropoff: Coordinates::new(12.99, 77.61),
            status,
            created_at: Utc::now(),
            assigned_at: None,
            driver_arrived_at: None,
            started_at: None,
            ended_at: None,
            distance_km: None,
            fare: None,
            fare_breakdown: None,
        }
    }

    fn completed(id: i64, driver_id: i64, fare: f64, wait_min: i64, ride_min: i64) -> Ride {
        let arrived = Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap();
        let mut r = ride(id, Some(driver_id), RideStatus::Completed);
        r.driver_arrived_at = Some(arrived);
        r.started_at = Some(arrived + Duration::minutes(wait_min));
        r.ended_at = Some(arrived + Duration::minutes(wait_min + ride_min));
        r.fare = Some(fare);
        r
    }

    fn driver(id: i64, cancelled: i32) -> Driver {
        Driver {
            id,
            name: format!("Driver{}", id),
            location: Coordinates::new(12.97, 77.59),
            available: true,
            active_ride_id: None,
            cancelled_rides_count: cancelled,
            last_ride_ended_at: None,
        }
    }

    #[test]
    fn test_summary_counts_and_averages() {
        let rides = vec![
            completed(1, 2, 100.0, 2, 10),
            completed(2, 2, 50.0, 4, 20),
            completed(3, 1, 80.0, 3, 30),
            ride(4, None, RideStatus::Pending),
            ride(5, Some(3), RideStatus::Assigned),
        ];
        let drivers = vec![driver(1, 0), driver(2, 1), driver(3, 0)];

        let summary = summarize(&rides, &drivers);
        assert_eq!(summary.total_rides, 5);
        assert_eq!(summary.completed_rides, 3);
        assert_eq!(summary.unmatched_rides, 1);
        assert_eq!(summary.avg_wait_minutes, 3.0);
        assert_eq!(summary.avg_ride_minutes, 20.0);

        let ids: Vec<i64> = summary.drivers.iter().map(|d| d.driver_id).collect();
        assert_eq!(ids, vec![1, 2]);
        let second = &summary.drivers[1];
        assert_eq!(second.completed_rides, 2);
        assert_eq!(second.total_fare, 150.0);
        assert_eq!(second.avg_fare, 75.0);
        assert_eq!(second.cancelled_rides, 1);
        assert_eq!(second.avg_wait_minutes, 3.0);
        assert_eq!(second.avg_ride_minutes, 15.0);
    }

    #[test]
    fn test_empty_summary_has_zero_averages() {
        let summary = summarize(&[], &[]);
        assert_eq!(summary.total_rides, 0);
        assert_eq!(summary.avg_wait_minutes, 0.0);
        assert!(summary.drivers.is_empty());
    }
}

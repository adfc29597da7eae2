//! Allocation pass types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a driver was not considered for a ride
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    ActiveRide,
    RecentPairing,
    CancellationPenalty,
    OutOfRange,
}

/// Per-reason exclusion counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionTally {
    pub active_ride: u32,
    pub recent_pairing: u32,
    pub cancellation_penalty: u32,
    pub out_of_range: u32,
}

impl ExclusionTally {
    pub fn record(&mut self, reason: ExclusionReason) {
        match reason {
            ExclusionReason::ActiveRide => self.active_ride += 1,
            ExclusionReason::RecentPairing => self.recent_pairing += 1,
            ExclusionReason::CancellationPenalty => self.cancellation_penalty += 1,
            ExclusionReason::OutOfRange => self.out_of_range += 1,
        }
    }

    pub fn merge(&mut self, other: &ExclusionTally) {
        self.active_ride += other.active_ride;
        self.recent_pairing += other.recent_pairing;
        self.cancellation_penalty += other.cancellation_penalty;
        self.out_of_range += other.out_of_range;
    }

    pub fn total(&self) -> u32 {
        self.active_ride + self.recent_pairing + self.cancellation_penalty + self.out_of_range
    }
}

/// A driver claimed for a ride, waiting for the pass commit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub ride_id: i64,
    pub driver_id: i64,
    pub assigned_at: DateTime<Utc>,
    pub distance_km: f64,
    pub radius_km: f64,
}

/// Result of one allocation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationReport {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub rides_scanned: usize,
    pub rides_assigned: usize,
    pub rides_unmatched: usize,
    pub exclusions: ExclusionTally,
    pub assignments: Vec<Assignment>,
    pub unmatched_ride_ids: Vec<i64>,
}

impl AllocationReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            started_at,
            rides_scanned: 0,
            rides_assigned: 0,
            rides_unmatched: 0,
            exclusions: ExclusionTally::default(),
            assignments: Vec::new(),
            unmatched_ride_ids: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn assignment_for(&self, ride_id: i64) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.ride_id == ride_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_record_and_merge() {
        let mut a = ExclusionTally::default();
        a.record(ExclusionReason::ActiveRide);
        a.record(ExclusionReason::OutOfRange);
        a.record(ExclusionReason::OutOfRange);

        let mut b = ExclusionTally::default();
        b.record(ExclusionReason::RecentPairing);
        b.merge(&a);

        assert_eq!(b.active_ride, 1);
        assert_eq!(b.recent_pairing, 1);
        assert_eq!(b.out_of_range, 2);
        assert_eq!(b.total(), 4);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = AllocationReport::new(Utc::now());
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"ridesUnmatched\":0"));
        assert!(json.contains("\"cancellationPenalty\":0"));
    }
}

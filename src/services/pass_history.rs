//! Recent allocation passes
//!
//! Bounded in-memory log of pass outcomes, newest first. Served over NATS for
//! operators; not persisted across restarts.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AllocationReport, ExclusionTally};

const MAX_HISTORY_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassHistoryEntry {
    pub id: Uuid,
    pub status: PassStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub rides_scanned: usize,
    pub rides_assigned: usize,
    pub rides_unmatched: usize,
    pub exclusions: ExclusionTally,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassHistoryResponse {
    pub passes: Vec<PassHistoryEntry>,
    pub total: usize,
}

#[derive(Default)]
pub struct PassHistory {
    entries: RwLock<VecDeque<PassHistoryEntry>>,
}

impl PassHistory {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(MAX_HISTORY_SIZE)),
        }
    }

    pub fn record_completed(&self, report: &AllocationReport, finished_at: DateTime<Utc>) {
        self.push(PassHistoryEntry {
            id: report.pass_id,
            status: PassStatus::Completed,
            started_at: report.started_at,
            finished_at,
            duration_ms: elapsed_ms(report.started_at, finished_at),
            rides_scanned: report.rides_scanned,
            rides_assigned: report.rides_assigned,
            rides_unmatched: report.rides_unmatched,
            exclusions: report.exclusions,
            error: None,
        });
    }

    pub fn record_failed(&self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>, error: String) {
        self.push(PassHistoryEntry {
            id: Uuid::new_v4(),
            status: PassStatus::Failed,
            started_at,
            finished_at,
            duration_ms: elapsed_ms(started_at, finished_at),
            rides_scanned: 0,
            rides_assigned: 0,
            rides_unmatched: 0,
            exclusions: ExclusionTally::default(),
            error: Some(error),
        });
    }

    fn push(&self, entry: PassHistoryEntry) {
        let mut entries = self.entries.write();
        if entries.len() >= MAX_HISTORY_SIZE {
            entries.pop_back();
        }
        entries.push_front(entry);
    }

    pub fn get_recent(&self, limit: usize) -> PassHistoryResponse {
        let entries = self.entries.read();
        PassHistoryResponse {
            passes: entries.iter().take(limit).cloned().collect(),
            total: entries.len(),
        }
    }

    pub fn last(&self) -> Option<PassHistoryEntry> {
        self.entries.read().front().cloned()
    }
}

fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(assigned: usize) -> AllocationReport {
        let mut report = AllocationReport::new(Utc::now());
        report.rides_scanned = assigned + 1;
        report.rides_assigned = assigned;
        report.rides_unmatched = 1;
        report
    }

    #[test]
    fn test_newest_pass_first() {
        let history = PassHistory::new();
        history.record_completed(&report(1), Utc::now());
        history.record_completed(&report(2), Utc::now());

        let recent = history.get_recent(10);
        assert_eq!(recent.total, 2);
        assert_eq!(recent.passes[0].rides_assigned, 2);
        assert_eq!(recent.passes[1].rides_assigned, 1);
    }

    #[test]
    fn test_failed_pass_keeps_error() {
        let history = PassHistory::new();
        let started = Utc::now();
        history.record_failed(started, started, "connection reset".to_string());

        let last = history.last().unwrap();
        assert_eq!(last.status, PassStatus::Failed);
        assert_eq!(last.error.as_deref(), Some("connection reset"));
        assert_eq!(last.rides_assigned, 0);
    }

    #[test]
    fn test_history_is_bounded() {
        let history = PassHistory::new();
        for i in 0..150 {
            history.record_completed(&report(i), Utc::now());
        }
        let recent = history.get_recent(500);
        assert_eq!(recent.total, MAX_HISTORY_SIZE);
        assert_eq!(recent.passes[0].rides_assigned, 149);
    }
}

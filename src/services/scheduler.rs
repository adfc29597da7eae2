//! Periodic allocation trigger
//!
//! Runs an allocation pass on a fixed interval until stopped. Passes never
//! overlap: a trigger that arrives while a pass is running is skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::services::matcher::RideMatcher;
use crate::services::pass_history::PassHistory;
use crate::types::AllocationReport;

pub struct AllocationScheduler {
    matcher: Arc<RideMatcher>,
    history: Arc<PassHistory>,
    interval: Duration,
    running: Mutex<()>,
    token: CancellationToken,
}

impl AllocationScheduler {
    pub fn new(matcher: Arc<RideMatcher>, history: Arc<PassHistory>, interval: Duration) -> Self {
        Self {
            matcher,
            history,
            interval,
            running: Mutex::new(()),
            token: CancellationToken::new(),
        }
    }

    /// Run one pass now. Returns `None` if another pass is still in flight.
    pub async fn run_once(&self) -> Option<Result<AllocationReport>> {
        let Ok(_guard) = self.running.try_lock() else {
            debug!("Allocation pass still running, skipping trigger");
            return None;
        };

        let started_at = Utc::now();
        let result = self.matcher.run_pass(started_at).await;
        let finished_at = Utc::now();

        match &result {
            Ok(report) => self.history.record_completed(report, finished_at),
            Err(e) => {
                error!("Allocation pass failed, rides stay pending until next tick: {}", e);
                self.history.record_failed(started_at, finished_at, e.to_string());
            }
        }
        Some(result)
    }

    /// Spawn the periodic loop. The first pass runs immediately.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Allocation scheduler started, interval {:?}", scheduler.interval);

            loop {
                tokio::select! {
                    _ = scheduler.token.cancelled() => {
                        info!("Allocation scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        scheduler.run_once().await;
                    }
                }
            }
        })
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::matcher::MatchingConfig;
    use crate::services::store::{DispatchStore, FailPoint, InMemoryDispatchStore};
    use crate::services::pass_history::PassStatus;
    use crate::types::{Coordinates, Driver, Ride, RideStatus};

    fn scheduler(store: &Arc<InMemoryDispatchStore>, interval: Duration) -> Arc<AllocationScheduler> {
        let dyn_store: Arc<dyn DispatchStore> = store.clone();
        let matcher = Arc::new(RideMatcher::new(dyn_store, MatchingConfig::default()));
        Arc::new(AllocationScheduler::new(matcher, Arc::new(PassHistory::new()), interval))
    }

    fn seed(store: &InMemoryDispatchStore) {
        store.put_driver(Driver {
            id: 1,
            name: "Driver1".into(),
            location: Coordinates::new(12.972, 77.595),
            available: true,
            active_ride_id: None,
            cancelled_rides_count: 0,
            last_ride_ended_at: None,
        });
        store.put_ride(Ride {
            id: 2,
            rider_id: 3,
            driver_id: None,
            pickup: Coordinates::new(12.9716, 77.5946),
            dropoff: Coordinates::new(12.99, 77.61),
            status: RideStatus::Pending,
            created_at: Utc::now(),
            assigned_at: None,
            driver_arrived_at: None,
            started_at: None,
            ended_at: None,
            distance_km: None,
            fare: None,
            fare_breakdown: None,
        });
    }

    #[tokio::test]
    async fn run_once_records_pass() {
        let store = Arc::new(InMemoryDispatchStore::new());
        seed(&store);
        let scheduler = scheduler(&store, Duration::from_secs(10));

        let report = scheduler.run_once().await.unwrap().unwrap();
        assert_eq!(report.rides_assigned, 1);
        let last = scheduler.history.last().unwrap();
        assert_eq!(last.status, PassStatus::Completed);
        assert_eq!(last.id, report.pass_id);
    }

    #[tokio::test]
    async fn failed_pass_is_recorded() {
        let store = Arc::new(InMemoryDispatchStore::new());
        seed(&store);
        store.fail_on(FailPoint::ListPendingRides);
        let scheduler = scheduler(&store, Duration::from_secs(10));

        assert!(scheduler.run_once().await.unwrap().is_err());
        assert_eq!(scheduler.history.last().unwrap().status, PassStatus::Failed);
    }

    #[tokio::test]
    async fn busy_scheduler_skips_trigger() {
        let store = Arc::new(InMemoryDispatchStore::new());
        let scheduler = scheduler(&store, Duration::from_secs(10));

        let _held = scheduler.running.lock().await;
        assert!(scheduler.run_once().await.is_none());
        assert!(scheduler.history.last().is_none());
    }

    #[tokio::test]
    async fn loop_runs_until_stopped() {
        let store = Arc::new(InMemoryDispatchStore::new());
        seed(&store);
        let scheduler = scheduler(&store, Duration::from_millis(20));

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.stop();
        handle.await.unwrap();

        assert!(scheduler.is_stopped());
        assert!(scheduler.history.get_recent(100).total >= 1);
        assert_eq!(store.ride(2).unwrap().status, RideStatus::Assigned);
    }
}

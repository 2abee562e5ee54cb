//! Periodic re-run of the synchronization job.
//!
//! The interval lives in a `watch` channel. Changing it re-arms the pending
//! firing (next run = now + new interval) and leaves an in-flight run alone.

use crate::job;
use crate::state::AppState;
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// One year. Larger values are clamped.
pub const MAX_INTERVAL_MINUTES: u64 = 525_600;

pub fn interval_from_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.clamp(1, MAX_INTERVAL_MINUTES) * 60)
}

#[derive(Clone)]
pub struct SchedulerHandle {
    interval_tx: Arc<watch::Sender<Duration>>,
    next_run: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl SchedulerHandle {
    pub fn new(interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(interval);
        Self {
            interval_tx: Arc::new(tx),
            next_run: Arc::new(RwLock::new(None)),
        }
    }

    pub fn interval(&self) -> Duration {
        *self.interval_tx.borrow()
    }

    /// When the next firing is due, or `None` if the loop is not running.
    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        *self.next_run.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the interval. The running loop picks it up immediately.
    pub fn reschedule(&self, interval: Duration) {
        self.interval_tx.send_replace(interval);
        if self.next_run().is_some() {
            self.arm(interval);
        }
        info!(minutes = interval.as_secs() / 60, "scheduler interval updated");
    }

    fn arm(&self, interval: Duration) {
        let next = chrono::Duration::from_std(interval)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));
        *self.next_run.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

/// Spawn the scheduler loop on the current runtime.
///
/// A firing that lands while a run is still in flight is skipped.
pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    let mut rx = state.scheduler.interval_tx.subscribe();
    tokio::spawn(async move {
        loop {
            let interval = *rx.borrow_and_update();
            state.scheduler.arm(interval);
            debug!(next_run = ?state.scheduler.next_run(), "scheduler armed");

            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if job::start_run(&state).await {
                        info!("scheduled run started");
                    } else {
                        info!("scheduled run skipped, previous run still in progress");
                    }
                }
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        *state
            .scheduler
            .next_run
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    })
}

use crate::job::JobStatus;
use crate::scheduler::{interval_from_minutes, SchedulerHandle};
use regsync_core::config::ConfigStore;
use regsync_core::RunSummary;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Executes one synchronization run. Called on a blocking thread.
pub type Runner = Arc<dyn Fn(Arc<ConfigStore>) -> RunSummary + Send + Sync>;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub job: Arc<Mutex<JobStatus>>,
    pub scheduler: SchedulerHandle,
    pub runner: Runner,
}

impl AppState {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self::with_runner(store, Arc::new(regsync_core::run_once))
    }

    /// Build state around a custom runner. Tests use this to avoid touching
    /// the tracker and the spreadsheet.
    pub fn with_runner(store: Arc<ConfigStore>, runner: Runner) -> Self {
        let minutes = store.interval_minutes().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid interval in config, using default");
            regsync_core::config::DEFAULT_INTERVAL_MINUTES
        });
        Self {
            store,
            job: Arc::new(Mutex::new(JobStatus::default())),
            scheduler: SchedulerHandle::new(interval_from_minutes(minutes)),
            runner,
        }
    }
}

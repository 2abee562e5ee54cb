//! Background job execution and the status record polled by the UI.

use crate::state::AppState;
use chrono::{DateTime, Utc};
use regsync_core::{RunOutcome, RunSummary};
use serde::Serialize;
use tracing::{error, info};

pub const STATUS_IDLE: &str = "Idle";
pub const STATUS_RUNNING: &str = "Running";
pub const STATUS_COMPLETED: &str = "Completed Successfully";

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub running: bool,
    pub progress: u8,
    #[serde(serialize_with = "serialize_timestamp")]
    pub last_run: Option<DateTime<Utc>>,
    pub last_status: String,
    pub last_summary: Option<RunSummary>,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self {
            running: false,
            progress: 0,
            last_run: None,
            last_status: STATUS_IDLE.to_string(),
            last_summary: None,
        }
    }
}

impl JobStatus {
    fn begin(&mut self) {
        self.running = true;
        self.progress = 0;
        self.last_status = STATUS_RUNNING.to_string();
    }

    fn complete(&mut self, summary: RunSummary) {
        self.last_status = status_text(&summary.outcome);
        self.last_run = Some(summary.finished_at);
        self.last_summary = Some(summary);
        self.running = false;
        self.progress = 100;
    }

    fn abort(&mut self, reason: impl std::fmt::Display) {
        self.last_status = format!("Failed: {reason}");
        self.last_run = Some(Utc::now());
        self.running = false;
        self.progress = 100;
    }
}

/// Render a timestamp the way the UI displays it: `YYYY-MM-DD HH:MM:SS UTC`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn serialize_timestamp<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match ts {
        Some(ts) => serializer.serialize_str(&format_timestamp(ts)),
        None => serializer.serialize_none(),
    }
}

fn status_text(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed | RunOutcome::NoTickets => STATUS_COMPLETED.to_string(),
        RunOutcome::Failed { reason } => format!("Failed: {reason}"),
    }
}

/// Start a run in the background unless one is already in flight.
///
/// Returns `false` without doing anything when a run is active. The running
/// flag is checked and set under one lock so two callers cannot both start.
pub async fn start_run(state: &AppState) -> bool {
    {
        let mut job = state.job.lock().await;
        if job.running {
            return false;
        }
        job.begin();
    }

    let job = state.job.clone();
    let store = state.store.clone();
    let runner = state.runner.clone();
    tokio::spawn(async move {
        info!("synchronization run started");
        let result = tokio::task::spawn_blocking(move || runner(store)).await;
        let mut job = job.lock().await;
        match result {
            Ok(summary) => {
                info!(
                    run = %summary.id,
                    processed = summary.processed,
                    skipped = summary.skipped,
                    failed = summary.is_failure(),
                    "synchronization run finished"
                );
                job.complete(summary);
            }
            Err(e) => {
                error!(error = %e, "synchronization run panicked");
                job.abort(e);
            }
        }
    });
    true
}

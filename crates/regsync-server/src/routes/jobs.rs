use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::error::AppError;
use crate::job::{self, JobStatus};
use crate::state::AppState;

/// POST /trigger: start a run in the background.
///
/// Returns immediately; poll `/status` for the result. 409 when a run is
/// already in flight.
pub async fn trigger(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    if !job::start_run(&app).await {
        return Err(AppError::conflict("Job is already running."));
    }
    Ok(Json(json!({ "message": "Job triggered successfully." })))
}

/// GET /status
pub async fn status(State(app): State<AppState>) -> Json<JobStatus> {
    Json(app.job.lock().await.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Runner;
    use regsync_core::config::ConfigStore;
    use regsync_core::{RunOutcome, RunSummary};
    use std::sync::Arc;

    fn app_with(runner: Runner) -> (tempfile::TempDir, AppState) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ConfigStore::create(dir.path().join("config.json"), Default::default()).unwrap();
        (dir, AppState::with_runner(Arc::new(store), runner))
    }

    fn failing_runner() -> Runner {
        Arc::new(|_store: Arc<ConfigStore>| {
            let now = chrono::Utc::now();
            RunSummary {
                id: "t".into(),
                started_at: now,
                finished_at: now,
                fetched: 0,
                processed: 0,
                skipped: 0,
                outcome: RunOutcome::Failed {
                    reason: "boom".into(),
                },
            }
        })
    }

    #[tokio::test]
    async fn trigger_is_rejected_while_running() {
        let (_dir, app) = app_with(failing_runner());
        app.job.lock().await.running = true;
        let err = trigger(State(app)).await.unwrap_err();
        assert!(err.0.to_string().contains("already running"));
    }

    #[tokio::test]
    async fn trigger_runs_and_records_failure() {
        let (_dir, app) = app_with(failing_runner());
        let Json(body) = trigger(State(app.clone())).await.unwrap();
        assert_eq!(body["message"], "Job triggered successfully.");

        for _ in 0..200 {
            if !app.job.lock().await.running {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let Json(status) = status(State(app)).await;
        assert!(!status.running);
        assert_eq!(status.progress, 100);
        assert_eq!(status.last_status, "Failed: boom");
        assert!(status.last_run.is_some());
    }
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::job::format_timestamp;
use crate::state::AppState;

/// GET /schedule/status: when the scheduler will fire next.
pub async fn schedule_status(State(app): State<AppState>) -> Response {
    match app.scheduler.next_run() {
        Some(next) => Json(json!({ "next_run": format_timestamp(&next) })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "next_run": null, "message": "No job found" })),
        )
            .into_response(),
    }
}

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use regsync_core::config::log_file_name;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    date: Option<String>,
}

/// GET /logs?date=YYYY-MM-DD: download one day's log file.
pub async fn download_log(
    State(app): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Response, AppError> {
    let raw = query.date.unwrap_or_default();
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(format!("invalid date '{raw}', expected YYYY-MM-DD")))?;

    let name = log_file_name(date);
    let path = app.store.log_dir().join(&name);
    let content = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::not_found("Log file not found."));
        }
        Err(e) => return Err(e.into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        content,
    )
        .into_response())
}

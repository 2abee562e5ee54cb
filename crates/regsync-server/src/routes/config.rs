use axum::extract::State;
use axum::Json;
use regsync_core::config::{self, EXPOSED_KEYS};
use serde_json::{json, Map, Value};

use crate::error::AppError;
use crate::scheduler::{interval_from_minutes, MAX_INTERVAL_MINUTES};
use crate::state::AppState;

/// GET /config/data: the keys the configuration page edits.
///
/// Keys absent from the store read as `""`.
pub async fn config_data(State(app): State<AppState>) -> Json<Map<String, Value>> {
    let data = EXPOSED_KEYS
        .iter()
        .map(|key| {
            let value = app.store.get_or(key, Value::String(String::new()));
            (key.to_string(), value)
        })
        .collect();
    Json(data)
}

/// POST /config/update: set every key of a JSON object and persist once.
pub async fn update_config(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let Value::Object(entries) = body else {
        return Err(AppError::bad_request("request body must be a JSON object"));
    };
    let store = app.store.clone();
    let keys: Vec<String> = entries.keys().cloned().collect();
    tokio::task::spawn_blocking(move || store.set_many(entries))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    tracing::info!(?keys, "configuration updated");
    Ok(Json(json!({ "message": "Configuration updated successfully." })))
}

/// POST /config/update_interval: persist a new run interval and re-arm
/// the scheduler.
pub async fn update_interval(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let minutes = parse_interval(body.get("interval"))?;
    let store = app.store.clone();
    tokio::task::spawn_blocking(move || store.set(config::INTERVAL_MINUTES, json!(minutes)))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    app.scheduler.reschedule(interval_from_minutes(minutes));
    Ok(Json(json!({
        "message": format!("Scheduler interval updated to {minutes} minutes.")
    })))
}

fn parse_interval(raw: Option<&Value>) -> Result<u64, AppError> {
    let minutes = match raw {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match minutes {
        Some(n) if (1..=MAX_INTERVAL_MINUTES).contains(&n) => Ok(n),
        _ => Err(AppError::bad_request(format!(
            "interval must be a whole number of minutes between 1 and {MAX_INTERVAL_MINUTES}"
        ))),
    }
}

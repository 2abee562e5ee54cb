//! HTTP control surface for the regression-progress synchronizer: trigger a
//! run, poll its status, edit configuration, inspect the schedule, and
//! download daily logs.

pub mod embed;
pub mod error;
pub mod job;
pub mod routes;
pub mod scheduler;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Pages
        .route("/", get(embed::index_page))
        .route("/config", get(embed::config_page))
        .route("/static/{*path}", get(embed::static_handler))
        // Jobs
        .route("/trigger", post(routes::jobs::trigger))
        .route("/status", get(routes::jobs::status))
        // Logs
        .route("/logs", get(routes::logs::download_log))
        // Config
        .route("/config/data", get(routes::config::config_data))
        .route("/config/update", post(routes::config::update_config))
        .route(
            "/config/update_interval",
            post(routes::config::update_interval),
        )
        // Schedule
        .route("/schedule/status", get(routes::schedule::schedule_status))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the scheduler and serve on a pre-bound listener until the future is
/// dropped.
///
/// Accepting a bound `TcpListener` lets the caller read the actual port first
/// (useful when `port = 0` and the OS picks a free port).
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let scheduler = scheduler::spawn(app_state.clone());
    let app = build_router(app_state);

    tracing::info!("regression sync server listening on http://localhost:{actual_port}");

    if open_browser {
        let url = format!("http://localhost:{actual_port}");
        if let Err(e) = open::that(&url) {
            tracing::warn!(error = %e, "could not open browser");
        }
    }

    let result = axum::serve(listener, app).await;
    scheduler.abort();
    result?;
    Ok(())
}

use anyhow::Result;
use regsync_server::AppState;
use std::path::Path;
use std::sync::Arc;

pub fn run(config: &Path, port: u16, open: bool) -> Result<()> {
    let store = Arc::new(super::load_store(config)?);
    let interval = store.interval_minutes()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let actual_port = listener.local_addr()?.port();
        println!(
            "regsync → http://localhost:{actual_port}  (runs every {interval} min, config {})",
            store.path().display()
        );

        let state = AppState::new(store);
        tokio::select! {
            res = regsync_server::serve_on(state, listener, open) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}

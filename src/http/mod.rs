//! HTTP API: the plain REST surface external clients talk to.
//! Binds and serves with graceful shutdown: `axum::serve` raced against
//! `tokio::select!` on a `CancellationToken`.

pub mod response;
mod routes;
mod state;

pub use state::AppState;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::store::RocksStore;

/// Bind and serve the HTTP API until Ctrl+C, using `settings` for the
/// store base directory, visit pattern, and bind address.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    crate::logging::init_with_config(&settings.logging);

    let store = Arc::new(RocksStore::new(settings.store_path.clone()));
    let state = AppState::new(store, settings.visit_pattern.clone(), settings.indexing.clone(), settings.indexing.debounce_ms);

    let router = routes::router(state.clone());
    let bind = format!("{}:{}", settings.http.bind_address, settings.http.port);

    crate::log_event!("http", "starting", "graphkeep HTTP API on {bind}");
    let listener = tokio::net::TcpListener::bind(&bind).await?;

    let ct = CancellationToken::new();
    let janitor = tokio::spawn(run_janitor(state.indexer.clone(), settings.indexing.clean_check_interval_minutes, ct.clone()));
    let server = axum::serve(listener, router);

    tokio::select! {
        result = server => {
            result?;
        }
        _ = shutdown_signal() => {
            crate::log_event!("http", "stopping", "received shutdown signal");
            ct.cancel();
        }
    }

    janitor.abort();
    crate::log_event!("http", "stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl+c");
}

/// Background retention sweep: every `interval_minutes`, purge project
/// namespaces idle past their configured expiry, until `ct` is cancelled.
async fn run_janitor(indexer: crate::indexer::Indexer, interval_minutes: u64, ct: CancellationToken) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_minutes.max(1) * 60));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match indexer.purge_expired() {
                    Ok(purged) if !purged.is_empty() => {
                        crate::log_event!("indexer", "retention", "purged {} expired project(s)", purged.len());
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "retention sweep failed"),
                }
            }
            _ = ct.cancelled() => break,
        }
    }
}

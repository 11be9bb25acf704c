//! HTTP presentation layer: a single HTML page plus the JSON it polls.

pub mod api;
pub mod format;

use axum::response::Html;
use axum::routing::get;
use axum::Router;
use dash_core::Result;
use dash_sampler::Sampler;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub sampler:             Arc<Sampler>,
    /// How often the page polls the API.
    pub refresh_interval_ms: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/config", get(api::config))
        .route("/api/series/{kind}", get(api::series))
        .route("/api/top", get(api::top))
        .route("/api/uptime", get(api::uptime))
        .with_state(state)
}

/// Serve the dashboard until `shutdown` resolves, then drain in-flight
/// requests.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("dashboard listening on http://{addr}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

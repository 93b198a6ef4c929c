use crate::handler::{self, AppState};
use crate::manager::LeaseManager;
use crate::reaper::spawn_reaper;
use crate::request_id::request_id_middleware;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(manager: Arc<LeaseManager>) -> Router {
    Router::new()
        .route("/acquire", post(handler::acquire))
        .route("/renew", post(handler::renew))
        .route("/release", post(handler::release))
        .route("/inspect", post(handler::inspect))
        .route("/locks/{resource_id}", get(handler::inspect_path))
        .route("/list", get(handler::list_locks))
        .route("/time", get(handler::server_time))
        .route("/health", get(handler::health))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(AppState { manager })
}

/// Serves the coordinator on `listener` with an expiry reaper running
/// alongside, until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    manager: Arc<LeaseManager>,
    reap_interval: Duration,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let reaper = spawn_reaper(manager.clone(), reap_interval);
    info!("Listening on {}", listener.local_addr()?);

    let result = axum::serve(listener, router(manager))
        .with_graceful_shutdown(shutdown)
        .await;

    reaper.stop().await;
    info!("Lock coordinator stopped");
    result
}

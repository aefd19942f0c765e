//! HTTP surface: `GET /api/news`.
//!
//! The endpoint never reports upstream trouble as an error status. When no
//! source answers, it serves `{"items": []}` with a short `s-maxage` so CDNs
//! come back soon.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{Method, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::aggregator::Aggregator;
use crate::cache::CacheStore;
use crate::config::STALE_WHILE_REVALIDATE;
use crate::feeds::FeedFetcher;
use crate::models::NewsResponse;

pub fn router<F, C>(aggregator: Arc<Aggregator<F, C>>) -> Router
where
    F: FeedFetcher,
    C: CacheStore + 'static,
{
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_origin(Any)
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/news", get(news_handler::<F, C>))
        .layer(cors)
        .with_state(aggregator)
}

async fn news_handler<F, C>(State(aggregator): State<Arc<Aggregator<F, C>>>) -> Response
where
    F: FeedFetcher,
    C: CacheStore + 'static,
{
    let entry = aggregator.news().await;
    (
        [(header::CACHE_CONTROL, cache_control(entry.ttl))],
        Json(NewsResponse {
            items: &entry.items,
        }),
    )
        .into_response()
}

/// `Cache-Control` value advertising `ttl` to shared caches.
pub fn cache_control(ttl: Duration) -> String {
    format!(
        "s-maxage={}, stale-while-revalidate={}",
        ttl.as_secs(),
        STALE_WHILE_REVALIDATE.as_secs()
    )
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn serve<F, C>(
    listener: TcpListener,
    aggregator: Arc<Aggregator<F, C>>,
) -> std::io::Result<()>
where
    F: FeedFetcher,
    C: CacheStore + 'static,
{
    axum::serve(listener, router(aggregator))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

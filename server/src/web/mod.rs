use axum::{
    Router,
    routing::{any, get},
};
use http::HeaderValue;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::compression::CompressionLevel;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::error::Result as AppResult;
use crate::state::AppState;

pub mod error;
pub mod handlers;
pub mod ws;

pub use self::error::WebError;

const RATE_LIMIT_REPLENISH_MS: u64 = 500;
const RATE_LIMIT_BURST: u32 = 30;

/// Unparseable origins are skipped rather than failing startup.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(cors.origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        tracing::info!("Restrictive CORS policy applied (no origins configured)");
        return CorsLayer::new();
    }

    tracing::info!(
        cors.origins.count = allowed.len(),
        "CORS configured with allowed origins"
    );
    CorsLayer::new()
        .allow_methods(vec![http::Method::GET])
        .allow_origin(allowed)
        .allow_headers(vec![http::header::CONTENT_TYPE, http::header::ACCEPT])
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/rooms/{code}", get(handlers::room_summary_handler))
        .route("/ws", any(ws::ws_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CompressionLayer::new()
                .quality(CompressionLevel::Default)
                .gzip(true),
        )
}

#[tracing::instrument(skip(app_state, server_config), fields(
    server.port = server_config.port,
    cors.origins.count = server_config.cors_origins.len()
))]
pub async fn run_server(app_state: AppState, server_config: ServerConfig) -> AppResult<()> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(RATE_LIMIT_REPLENISH_MS)
            .burst_size(RATE_LIMIT_BURST)
            .finish()
            .ok_or_else(|| {
                WebError::InternalServerError("Invalid rate limiter configuration".to_string())
            })?,
    );
    tracing::info!(
        rate_limit.per_ms = RATE_LIMIT_REPLENISH_MS,
        rate_limit.burst_size = RATE_LIMIT_BURST,
        "Rate limiter configured"
    );

    let governor_limiter = governor_conf.limiter().clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let app = build_router(app_state)
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors_layer(&server_config.cors_origins));

    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    tracing::info!(server.address = %addr, "HTTP server starting");

    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(Into::into)
}

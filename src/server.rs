use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::api;
use crate::config::AppConfig;
use crate::persistence;
use crate::runtime::MatchRunManager;

/// Wire the store, run manager and configuration into shared state.
pub async fn build_state(config: Arc<AppConfig>) -> anyhow::Result<AppState> {
    let store = persistence::connect(&config.persistence).await?;
    info!(
        name: "persistence.connected",
        provider = %config.persistence.provider,
        "Match store ready"
    );

    let matcher = config.matching.build_matcher();
    let runs = Arc::new(MatchRunManager::new(store, matcher));

    Ok(AppState { runs, config })
}

/// Routes plus the tracing and request-timeout layers.
pub fn build_app(state: AppState) -> Router {
    let timeout_duration = Duration::from_secs(state.config.server.request_timeout_secs);

    api::router(state)
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(timeout_duration, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ))
        .layer(TraceLayer::new_for_http())
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let state = build_state(Arc::clone(&config)).await?;
    let app = build_app(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

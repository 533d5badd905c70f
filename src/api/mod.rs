//! HTTP trigger surface for the matching run.
//!
//! - `POST /api/matching`, `GET /api/matching/preview` and
//!   `GET /api/agents/{id}/match` take the service key.
//! - `GET /api/cron/matching` takes the cron secret.
//! - `GET /health` is open.

pub mod routes;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;
use crate::security::{BearerSecret, require_bearer};

pub fn router(state: AppState) -> Router {
    let service = Router::new()
        .route("/api/matching", post(routes::trigger_matching))
        .route("/api/matching/preview", get(routes::preview_matching))
        .route("/api/agents/{id}/match", get(routes::todays_match))
        .layer(axum::middleware::from_fn_with_state(
            BearerSecret::new(&state.config.security.service_key),
            require_bearer,
        ));

    let cron = Router::new()
        .route("/api/cron/matching", get(routes::cron_matching))
        .layer(axum::middleware::from_fn_with_state(
            BearerSecret::new(&state.config.security.cron_secret),
            require_bearer,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .merge(service)
        .merge(cron)
        .with_state(state)
}

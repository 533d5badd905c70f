use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::AppState;
use crate::domain::MatchReport;
use crate::runtime::{RankedCandidate, RunError};

type ApiError = (StatusCode, Json<Value>);

fn error_response(err: &RunError) -> ApiError {
    let status = match err {
        RunError::Match(_) => StatusCode::SERVICE_UNAVAILABLE,
        RunError::Store(_) | RunError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!(name: "api.matching.failed", error = %err, "Matching request failed");
    (status, Json(json!({ "error": err.to_string() })))
}

/// POST /api/matching - Run today's matching pass.
pub async fn trigger_matching(State(state): State<AppState>) -> Result<Json<MatchReport>, ApiError> {
    tracing::info!(name: "api.matching.triggered", source = "manual", "Matching run requested");
    state
        .runs
        .run_today()
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

/// GET /api/cron/matching - Scheduler entry point for the daily pass.
pub async fn cron_matching(State(state): State<AppState>) -> Result<Json<MatchReport>, ApiError> {
    tracing::info!(name: "api.matching.triggered", source = "cron", "Matching run requested");
    state
        .runs
        .run_today()
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

/// GET /api/matching/preview - Ranked candidate pairs, nothing persisted.
pub async fn preview_matching(
    State(state): State<AppState>,
) -> Result<Json<Vec<RankedCandidate>>, ApiError> {
    state
        .runs
        .preview()
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

const NO_MATCH_YET: &str = "No match today yet. Matching runs daily.";

/// GET /api/agents/{id}/match - The conversation an agent was paired into today.
pub async fn todays_match(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let found = state
        .runs
        .todays_match(&agent_id)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(match found {
        Some(m) => json!({ "match": m }),
        None => json!({ "match": null, "message": NO_MATCH_YET }),
    }))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

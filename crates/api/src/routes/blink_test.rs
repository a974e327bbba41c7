//! Blink Detection Routes
//!
//! Lifecycle of the webcam blink test: start, poll (stats plus the latest
//! frame), stop with verdict, and persistence of a completed result.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::SharedState;

/// Start a blink-counting session
pub async fn start(State(state): State<SharedState>) -> impl IntoResponse {
    let started = state.read().await.blink_session.start();
    if started {
        (StatusCode::OK, Json(json!({ "status": "started" })))
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "error": "Failed to start camera" })),
        )
    }
}

/// Poll the running session: counters plus the latest frame as base64 JPEG
pub async fn stats(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state.read().await;
    let stats = state.blink_session.get_stats();
    let frame = state.blink_session.current_frame_jpeg()?;

    Ok(Json(json!({
        "blink_count": stats.blink_count,
        "time_remaining": stats.time_remaining,
        "completed": stats.completed,
        "frame": BASE64.encode(frame),
    })))
}

/// Stop the session and return the final risk verdict
pub async fn stop(
    State(state): State<SharedState>,
) -> Result<Json<blink::RiskVerdict>, ApiError> {
    let state = state.read().await;
    state.blink_session.stop();
    Ok(Json(state.blink_session.get_final_results()))
}

/// Completed blink-test result to persist against a patient
#[derive(Debug, Deserialize)]
pub struct SaveBlinkRequest {
    pub patient_id: Option<i64>,
    #[serde(default)]
    pub blink_count: i64,
    #[serde(default)]
    pub duration: f64,
}

/// Save a completed blink test for a patient
pub async fn save_result(
    State(state): State<SharedState>,
    Json(request): Json<SaveBlinkRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let patient_id = request
        .patient_id
        .ok_or_else(|| ApiError::bad_request("patient_id required"))?;

    let state = state.read().await;
    let id = state
        .repository
        .insert_blink_result(patient_id, request.blink_count, request.duration)
        .await?;

    Ok(Json(json!({ "status": "saved", "id": id })))
}

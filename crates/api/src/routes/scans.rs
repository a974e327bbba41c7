//! Scan Classification Routes

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use storage::{NewPatient, NewScan};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::SharedState;

/// Prediction request: a data-URL image, optionally tied to a patient.
/// Without a patient_id an anonymous patient record is created.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub patient_id: Option<i64>,
    pub image: Option<String>,
    pub scan_type: Option<String>,
    pub scan_date: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// Classify an uploaded scan image and persist the result
pub async fn predict(
    State(state): State<SharedState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let image = request
        .image
        .ok_or_else(|| ApiError::bad_request("No image data provided"))?;

    // Accept both bare base64 and "data:image/png;base64," URLs
    let encoded = image.rsplit(',').next().unwrap_or(&image);
    let image_bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| ApiError::bad_request(format!("Invalid image encoding: {e}")))?;

    let state = state.read().await;

    let patient_id = match request.patient_id {
        Some(id) => id,
        None => {
            state
                .repository
                .insert_patient(&NewPatient {
                    name: request.name.unwrap_or_else(|| "Anonymous".to_string()),
                    email: request.email,
                    phone: request.phone,
                    ..Default::default()
                })
                .await?
        }
    };

    let filename = format!("{}.png", Uuid::new_v4());
    let file_path = format!("{}/{}", state.config.uploads_dir, filename);
    tokio::fs::write(&file_path, &image_bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to store upload: {e}")))?;

    let prediction = state.classifier.classify(&image_bytes)?;
    info!(
        label = %prediction.label,
        confidence = prediction.confidence,
        "Scan classified"
    );

    state
        .repository
        .insert_scan(&NewScan {
            patient_id,
            file_path,
            scan_type: request.scan_type.unwrap_or_else(|| "MRI".to_string()),
            scan_date: request
                .scan_date
                .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string()),
            predicted_class: prediction.label.clone(),
            confidence: Some(prediction.confidence as f64),
        })
        .await?;

    Ok(Json(json!({
        "class": prediction.label,
        "confidence": prediction.confidence,
    })))
}

//! Patient Routes

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::SharedState;
use storage::{BlinkResultRecord, NewPatient, PatientRecord, ScanRecord, TypingResultRecord};

/// Registration request body; only the name is mandatory
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub age: Option<i64>,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

/// Scan entry as surfaced to the dashboard (confidence in percent)
#[derive(Debug, Serialize)]
pub struct ScanView {
    pub id: i64,
    pub scan_type: String,
    pub scan_date: String,
    pub predicted_class: String,
    pub confidence: Option<f64>,
    pub created_at: String,
}

impl From<ScanRecord> for ScanView {
    fn from(record: ScanRecord) -> Self {
        Self {
            id: record.id,
            scan_type: record.scan_type,
            scan_date: record.scan_date,
            predicted_class: record.predicted_class,
            confidence: record.confidence.map(|c| (c * 1000.0).round() / 10.0),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BlinkResultView {
    pub id: i64,
    pub blink_count: i64,
    pub duration: f64,
    pub created_at: String,
}

impl From<BlinkResultRecord> for BlinkResultView {
    fn from(record: BlinkResultRecord) -> Self {
        Self {
            id: record.id,
            blink_count: record.blink_count,
            duration: record.duration,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TypingResultView {
    pub id: i64,
    pub wpm: f64,
    pub accuracy: f64,
    pub created_at: String,
}

impl From<TypingResultRecord> for TypingResultView {
    fn from(record: TypingResultRecord) -> Self {
        Self {
            id: record.id,
            wpm: record.wpm,
            accuracy: record.accuracy,
            created_at: record.created_at,
        }
    }
}

/// Patient with all test results attached
#[derive(Debug, Serialize)]
pub struct PatientView {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub registered_at: String,
    pub scans: Vec<ScanView>,
    pub blink_results: Vec<BlinkResultView>,
    pub typing_results: Vec<TypingResultView>,
}

/// Register a new patient and return their id
pub async fn register(
    State(state): State<SharedState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let name = request.name.unwrap_or_default().trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }

    let state = state.read().await;
    let id = state
        .repository
        .insert_patient(&NewPatient {
            name: name.clone(),
            age: request.age,
            gender: request.gender,
            email: request.email,
            phone: request.phone,
            address: request.address,
        })
        .await?;

    Ok(Json(json!({ "patient_id": id, "name": name })))
}

/// All patients with their test results, newest first
pub async fn list(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PatientView>>, ApiError> {
    let state = state.read().await;
    let patients = state.repository.list_patients().await?;

    let mut views = Vec::with_capacity(patients.len());
    for patient in patients {
        let scans = state.repository.scans_for_patient(patient.id).await?;
        let blinks = state.repository.blink_results_for_patient(patient.id).await?;
        let typings = state.repository.typing_results_for_patient(patient.id).await?;
        views.push(view_of(patient, scans, blinks, typings));
    }

    Ok(Json(views))
}

/// One patient's details
pub async fn detail(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state.read().await;
    let patient = state
        .repository
        .get_patient(id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(json!({
        "id": patient.id,
        "name": patient.name,
        "age": patient.age,
        "gender": patient.gender,
        "email": patient.email,
        "phone": patient.phone,
        "address": patient.address,
        "registered_at": patient.created_at,
    })))
}

fn view_of(
    patient: PatientRecord,
    scans: Vec<ScanRecord>,
    blinks: Vec<BlinkResultRecord>,
    typings: Vec<TypingResultRecord>,
) -> PatientView {
    PatientView {
        id: patient.id,
        name: patient.name,
        age: patient.age,
        gender: patient.gender,
        email: patient.email,
        phone: patient.phone,
        address: patient.address,
        registered_at: patient.created_at,
        scans: scans.into_iter().map(ScanView::from).collect(),
        blink_results: blinks.into_iter().map(BlinkResultView::from).collect(),
        typing_results: typings.into_iter().map(TypingResultView::from).collect(),
    }
}

//! Screening API Server
//!
//! REST API and static front end for the clinical screening demo: patient
//! registration, scan classification, the webcam blink test, and typing
//! test results.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod typing;

pub use config::AppConfig;

use blink::BlinkSession;
use scan_classifier::ScanClassifier;
use storage::Repository;

/// Application state shared across handlers
pub struct AppState {
    /// Storage repository
    pub repository: Repository,
    /// The single blink-test session
    pub blink_session: BlinkSession,
    /// Scan image classifier
    pub classifier: ScanClassifier,
    /// Application configuration
    pub config: AppConfig,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
}

/// Handler-facing state handle
pub type SharedState = Arc<RwLock<AppState>>;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
    pub metrics: SystemMetrics,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub database: ComponentHealth,
    pub classifier: ComponentHealth,
    pub blink_session: ComponentHealth,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
}

/// System metrics
#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    pub patient_count: i64,
    pub scan_count: i64,
}

/// Create the application router
pub fn create_router(state: SharedState, static_dir: &str) -> Router {
    let index = format!("{static_dir}/index.html");
    let front_end = ServeDir::new(static_dir).not_found_service(ServeFile::new(index));

    Router::new()
        .route("/register_patient", post(routes::patients::register))
        .route("/get_patients", get(routes::patients::list))
        .route("/get_patient/:id", get(routes::patients::detail))
        .route("/predict", post(routes::scans::predict))
        .route("/start_blink_detection", post(routes::blink_test::start))
        .route("/get_blink_stats", get(routes::blink_test::stats))
        .route("/stop_blink_detection", post(routes::blink_test::stop))
        .route("/save_blink_result", post(routes::blink_test::save_result))
        .route("/save_typing_result", post(routes::typing_test::save_result))
        .route("/api/v1/health", get(health_handler))
        .fallback_service(front_end)
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let patient_count = state.repository.patient_count().await;
    let scan_count = state.repository.scan_count().await.unwrap_or(0);
    let database_ok = patient_count.is_ok();

    let response = HealthResponse {
        status: if database_ok { "healthy" } else { "degraded" }.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            database: ComponentHealth {
                status: if database_ok { "ok" } else { "error" }.to_string(),
            },
            classifier: ComponentHealth {
                status: if state.classifier.is_mock() { "mock" } else { "model" }.to_string(),
            },
            blink_session: ComponentHealth {
                status: if state.blink_session.get_stats().completed {
                    "idle"
                } else {
                    "active"
                }
                .to_string(),
            },
        },
        metrics: SystemMetrics {
            patient_count: patient_count.unwrap_or(0),
            scan_count,
        },
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Build state and run the server until shutdown
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(&config.uploads_dir).await?;

    let repository = Repository::connect(&config.database_url).await?;
    let classifier = ScanClassifier::new(config.scan.clone())?;
    let blink_session = BlinkSession::new(config.blink.clone(), config.camera.clone());

    let static_dir = config.static_dir.clone();
    let addr = format!("{}:{}", config.host, config.port);

    let state = Arc::new(RwLock::new(AppState {
        repository,
        blink_session,
        classifier,
        config,
        version: env!("CARGO_PKG_VERSION").to_string(),
        start_time: Instant::now(),
    }));

    let governor = rate_limit::create_governor_config(&rate_limit::RateLimitConfig::default());
    let app = create_router(state, &static_dir)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(GovernorLayer { config: governor });

    info!("Starting screening server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let uploads = std::env::temp_dir().join(format!("neuroscreen-test-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&uploads).await.unwrap();

        let config = AppConfig {
            uploads_dir: uploads.to_string_lossy().into_owned(),
            ..AppConfig::default()
        };

        let state = Arc::new(RwLock::new(AppState {
            repository: Repository::in_memory().await.unwrap(),
            blink_session: BlinkSession::new(config.blink.clone(), config.camera.clone()),
            classifier: ScanClassifier::new(config.scan.clone()).unwrap(),
            config,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }));

        create_router(state, "static")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_register_requires_name() {
        let app = test_app().await;
        let response = app
            .oneshot(post_json("/register_patient", json!({ "age": 50 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Name is required");
    }

    #[tokio::test]
    async fn test_register_and_fetch_patient() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/register_patient",
                json!({ "name": "Ada Lovelace", "age": 36 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["patient_id"], 1);

        let response = app.clone().oneshot(get_req("/get_patient/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["name"], "Ada Lovelace");

        let response = app.oneshot(get_req("/get_patient/99")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_save_blink_result_requires_patient_id() {
        let app = test_app().await;
        let response = app
            .oneshot(post_json("/save_blink_result", json!({ "blink_count": 9 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_typing_result_is_recomputed_from_raw_counts() {
        let app = test_app().await;

        app.clone()
            .oneshot(post_json("/register_patient", json!({ "name": "P" })))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                "/save_typing_result",
                json!({
                    "patient_id": 1,
                    "wpm": 999.0,
                    "accuracy": 250.0,
                    "typed_chars": 300,
                    "correct_chars": 270,
                    "elapsed_secs": 60.0,
                    "test_text": "the quick brown fox"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get_req("/get_patients")).await.unwrap();
        let body = body_json(response).await;
        let typing = &body[0]["typing_results"][0];
        assert_eq!(typing["wpm"], 60.0);
        assert_eq!(typing["accuracy"], 90.0);
    }

    #[tokio::test]
    async fn test_blink_session_lifecycle() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(post_json("/start_blink_detection", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "started");

        let response = app.clone().oneshot(get_req("/get_blink_stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["completed"], false);
        assert!(body["frame"].as_str().is_some_and(|f| !f.is_empty()));

        let response = app
            .oneshot(post_json("/stop_blink_detection", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["completed"], true);
        // The mock landmark provider reports open eyes, so no blinks
        assert_eq!(body["blink_count"], 0);
        assert_eq!(body["risk_level"], "HIGH CHANCE");
    }

    #[tokio::test]
    async fn test_predict_classifies_and_persists_scan() {
        let app = test_app().await;

        app.clone()
            .oneshot(post_json("/register_patient", json!({ "name": "P" })))
            .await
            .unwrap();

        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([200, 200, 200]));
        let mut png = std::io::Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).unwrap();
        let data_url = format!("data:image/png;base64,{}", BASE64.encode(png.into_inner()));

        let response = app
            .clone()
            .oneshot(post_json(
                "/predict",
                json!({ "patient_id": 1, "image": data_url }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["class"].as_str().is_some_and(|c| !c.is_empty()));
        assert!(body["confidence"].as_f64().is_some_and(|c| c > 0.0));

        let response = app.oneshot(get_req("/get_patients")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body[0]["scans"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_predict_without_image_is_rejected() {
        let app = test_app().await;
        let response = app
            .oneshot(post_json("/predict", json!({ "patient_id": 1 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_reports_components() {
        let app = test_app().await;
        let response = app.oneshot(get_req("/api/v1/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["classifier"]["status"], "mock");
    }
}

use crate::config::ApiConfig;
use crate::pipeline::SubmissionPipeline;
use crate::record_store::RecordStore;
use crate::submission::{Submission, SubmissionRequest};
use anyhow::{Context, Result};
use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SubmissionPipeline>,
    pub record_store: Arc<dyn RecordStore>,
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/", post(create_invite))
        .route("/api/v1/invites", post(create_invite))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "invite-service"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.record_store.row_count().await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "record_store": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "record_store": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// Accept a registration submission and return the rendered invitation.
///
/// Every failure anywhere in the pipeline — malformed body, bad data URL,
/// remote store errors, missing assets — collapses into the same response
/// shape: `{"status": "error", "message": ...}` with HTTP 500. Success is
/// `{"status": "success", "image": <base64 PNG>}`. Callers never receive a
/// partial image.
#[instrument(skip_all)]
async fn create_invite(
    State(state): State<AppState>,
    payload: Result<Json<SubmissionRequest>, JsonRejection>,
) -> impl IntoResponse {
    let result = async {
        let Json(request) = payload.context("Malformed request body")?;
        let submission =
            Submission::from_request(request).context("Failed to decode profile photo")?;
        state.pipeline.process(submission).await
    }
    .await;

    match result {
        Ok(rendered) => {
            info!(invite_id = %rendered.invite_id, "Submission succeeded");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "success",
                    "image": BASE64.encode(&rendered.png)
                })),
            )
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Submission failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "status": "error",
                    "message": format!("{e:#}")
                })),
            )
        }
    }
}

/// Start the API server
pub async fn start_api_server(state: AppState, config: &ApiConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting invite API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_store::MockAssetStore;
    use crate::compositor::Compositor;
    use crate::config::AssetConfig;
    use crate::record_store::MockRecordStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const PIXEL_B64: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn test_api_config() -> ApiConfig {
        ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_enabled: true,
            cors_origins: vec![],
        }
    }

    fn test_router(record_store: MockRecordStore, asset_store: MockAssetStore) -> Router {
        let root = env!("CARGO_MANIFEST_DIR");
        let assets = AssetConfig {
            template_path: format!("{root}/assets/background.png"),
            name_font_path: format!("{root}/assets/fonts/DejaVuSans-Bold.ttf"),
            detail_font_path: format!("{root}/assets/fonts/DejaVuSans.ttf"),
        };
        let compositor = Arc::new(Compositor::from_config(&assets).unwrap());

        let record_store: Arc<dyn RecordStore> = Arc::new(record_store);
        let pipeline = Arc::new(SubmissionPipeline::new(
            record_store.clone(),
            Arc::new(asset_store),
            compositor,
        ));

        create_router(
            AppState {
                pipeline,
                record_store,
            },
            &test_api_config(),
        )
    }

    fn submission_body() -> String {
        serde_json::json!({
            "file": format!("data:image/png;base64,{PIXEL_B64}"),
            "name": "Alice",
            "date": "2024-05-01",
            "mobile": "555-0100",
            "year": "3rd",
            "section": "B"
        })
        .to_string()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_successful_submission_returns_image() {
        let mut record_store = MockRecordStore::new();
        record_store.expect_row_count().returning(|| Ok(5));
        record_store
            .expect_append()
            .withf(|record| record.invite_id == "INV-006")
            .returning(|_| Ok(()));

        let mut asset_store = MockAssetStore::new();
        asset_store
            .expect_upload()
            .returning(|_, _, _| Ok("https://assets.example/alice.png".to_string()));

        let router = test_router(record_store, asset_store);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/invites")
                    .header("content-type", "application/json")
                    .header("origin", "https://frontend.example")
                    .body(Body::from(submission_body()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .map(|v| v.to_str().unwrap()),
            Some("*")
        );

        let json = body_json(response).await;
        assert_eq!(json["status"], "success");

        let png = BASE64.decode(json["image"].as_str().unwrap()).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert!(decoded.width() >= 1100 && decoded.height() >= 475);
    }

    #[tokio::test]
    async fn test_malformed_json_gets_uniform_error() {
        let mut record_store = MockRecordStore::new();
        record_store.expect_row_count().never();
        record_store.expect_append().never();
        let mut asset_store = MockAssetStore::new();
        asset_store.expect_upload().never();

        let router = test_router(record_store, asset_store);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert!(!json["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_data_url_gets_uniform_error() {
        let mut record_store = MockRecordStore::new();
        record_store.expect_row_count().never();
        record_store.expect_append().never();
        let mut asset_store = MockAssetStore::new();
        asset_store.expect_upload().never();

        let router = test_router(record_store, asset_store);

        let body = serde_json::json!({
            "file": "data:image/png;base64", // no comma separator
            "name": "Alice",
            "date": "2024-05-01",
            "mobile": "555-0100",
            "year": "3rd",
            "section": "B"
        })
        .to_string();

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/invites")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("Failed to decode profile photo"));
    }

    #[tokio::test]
    async fn test_upload_failure_gets_uniform_error() {
        let mut record_store = MockRecordStore::new();
        record_store.expect_row_count().never();
        record_store.expect_append().never();

        let mut asset_store = MockAssetStore::new();
        asset_store
            .expect_upload()
            .returning(|_, _, _| Err(anyhow::anyhow!("asset store unavailable")));

        let router = test_router(record_store, asset_store);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/invites")
                    .header("content-type", "application/json")
                    .body(Body::from(submission_body()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert!(!json["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_health_check() {
        let record_store = MockRecordStore::new();
        let asset_store = MockAssetStore::new();
        let router = test_router(record_store, asset_store);

        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
    }
}

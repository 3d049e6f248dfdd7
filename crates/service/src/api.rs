//! HTTP API for predictions, health checks and Prometheus metrics

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use estimator_lib::{PredictError, PredictionService};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application state; built once at startup and never replaced
pub type AppState = Arc<PredictionService>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn status_for(err: &PredictError) -> StatusCode {
    match err {
        PredictError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        PredictError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        PredictError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Single-row price prediction
async fn predict(State(service): State<AppState>, body: Bytes) -> Response {
    match service.predict_body(&body) {
        Ok(prediction) => (StatusCode::OK, Json(prediction)).into_response(),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                warn!(kind = e.kind(), error = %e, "Prediction failed");
            }
            error_response(status, e.to_string())
        }
    }
}

/// Health check response - always 200 while the process is up
async fn health(State(service): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(service.health()))
}

/// Readiness check response - returns 200 if a model is loaded, 503 otherwise
async fn readyz(State(service): State<AppState>) -> impl IntoResponse {
    let readiness = service.readiness();

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut router = Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics));

    if let Some(dir) = static_dir {
        if dir.exists() {
            info!(dir = %dir.display(), "Serving frontend assets");
            let assets = ServeDir::new(dir).not_found_service(ServeFile::new(dir.join("index.html")));
            router = router.fallback_service(assets);
        } else {
            warn!(dir = %dir.display(), "Static directory does not exist");
        }
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve<F>(addr: &str, router: Router, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

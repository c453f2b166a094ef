use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{Response, StatusCode},
    routing::{get, post},
};
use sanitizer::{
    ContentType, GuardError, ModelValidator, Record, SanitizerConfig, SecurityAnalysisResult,
    SecurityAnalyzer, ValidationResult, build_engines,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    validator: Arc<ModelValidator>,
    analyzer: Arc<SecurityAnalyzer>,
}

impl AppState {
    pub fn new(config: SanitizerConfig) -> Result<Self, GuardError> {
        let (validator, analyzer) = build_engines(config)?;
        Ok(Self {
            validator: Arc::new(validator),
            analyzer: Arc::new(analyzer),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SanitizeRequest {
    content: Value,
    #[serde(default)]
    content_type: ContentType,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    content: String,
    #[serde(default)]
    content_type: ContentType,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/sanitize", post(sanitize_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/report", post(report_handler))
        .route("/api/validate/article", post(validate_article_handler))
        .route("/api/validate/author", post(validate_author_handler))
        .with_state(state)
}

fn build_response(body: String, content_type: &str, status: StatusCode) -> Response<String> {
    match Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(body)
    {
        Ok(response) => response,
        Err(build_error) => {
            error!(?build_error, "Failed to build HTTP response");
            let mut fallback = Response::new(String::new());
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        }
    }
}

// Health check handler
pub async fn health_handler() -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "content-guard-api",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

async fn sanitize_handler(
    State(state): State<AppState>,
    Json(request): Json<SanitizeRequest>,
) -> Json<ValidationResult> {
    Json(
        state
            .validator
            .sanitizer()
            .sanitize_value(&request.content, request.content_type),
    )
}

async fn analyze_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<SecurityAnalysisResult> {
    Json(state.analyzer.analyze(&request.content))
}

async fn report_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Response<String> {
    let report = state.analyzer.report(&request.content, request.content_type);
    build_response(report, "text/plain; charset=utf-8", StatusCode::OK)
}

async fn validate_article_handler(
    State(state): State<AppState>,
    Json(record): Json<Record>,
) -> Json<ValidationResult<Record>> {
    Json(state.validator.validate_article(&record))
}

async fn validate_author_handler(
    State(state): State<AppState>,
    Json(record): Json<Record>,
) -> Json<ValidationResult<Record>> {
    Json(state.validator.validate_author(&record))
}

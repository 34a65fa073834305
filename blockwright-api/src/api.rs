use crate::config::ApiConfig;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use blockwright::{
    blocks_from_json, field_values, DetectResponse, Engine, EngineError, ErrorResponse, PayloadError, Warning,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Field-level warnings of a fill, as a JSON array of `{code, message, context}`
pub const WARNINGS_HEADER: HeaderName = HeaderName::from_static("x-blockwright-warnings");

/// Error envelope returned with every non-2xx status.
///
/// Engine failures carry their `BW_CORE_*` code; failures of the HTTP layer
/// itself use `BW_API_*` codes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl From<ErrorResponse> for ErrorBody {
    fn from(response: ErrorResponse) -> Self {
        Self {
            ok: false,
            error: response.error,
            code: response.code.as_str().to_string(),
            context: response.context,
        }
    }
}

/// Application-specific error types for the API
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("{0}")]
    BadRequest(String),

    /// The blocking engine task did not complete
    #[error("engine task failed: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Engine(e) if e.code.is_parse() || e.code.is_fill() => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Engine(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Multipart(e) => e.status(),
            AppError::Payload(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn body(&self) -> ErrorBody {
        let (code, context) = match self {
            AppError::Engine(e) => return ErrorResponse::from(e).into(),
            AppError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => ("BW_API_PAYLOAD_TOO_LARGE", None),
            AppError::Multipart(_) => ("BW_API_BAD_REQUEST", Some("multipart".to_string())),
            AppError::Payload(_) | AppError::BadRequest(_) => ("BW_API_BAD_REQUEST", None),
            AppError::Internal(_) => ("BW_API_INTERNAL", None),
        };
        ErrorBody {
            ok: false,
            error: self.to_string(),
            code: code.to_string(),
            context,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        } else {
            tracing::debug!("rejected request: {self}");
        }
        (status, Json(self.body())).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
}

/// Build the application router with the default configuration
pub fn app() -> Router {
    app_with_config(&ApiConfig::default())
}

/// Build the application router with all routes configured
pub fn app_with_config(config: &ApiConfig) -> Router {
    let state = AppState {
        engine: Arc::new(Engine::new(config.engine.clone())),
    };
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/detect", post(detect))
        .route("/api/fill", post(fill))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint for monitoring and load balancing
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "blockwright API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Parts of a multipart upload
#[derive(Default)]
struct Upload {
    file: Option<Bytes>,
    fields: Option<String>,
    blocks: Option<String>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut upload = Upload::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => upload.file = Some(field.bytes().await?),
                "fields" => upload.fields = Some(field.text().await?),
                "blocks" => upload.blocks = Some(field.text().await?),
                _ => tracing::debug!("ignoring multipart field '{name}'"),
            }
        }
        Ok(upload)
    }

    fn require_file(&mut self) -> Result<Bytes, AppError> {
        self.file
            .take()
            .ok_or_else(|| AppError::BadRequest("no file provided in upload".to_string()))
    }
}

/// Run an engine call on the blocking pool
async fn run_engine<T, F>(call: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(AppError::from)
}

/// Detect the blocks of an uploaded PDF
pub async fn detect(State(state): State<AppState>, multipart: Multipart) -> Result<Json<DetectResponse>, AppError> {
    let mut upload = Upload::read(multipart).await?;
    let pdf = upload.require_file()?;

    let engine = Arc::clone(&state.engine);
    let blocks = run_engine(move || engine.detect_blocks(&pdf)).await?;
    Ok(Json(DetectResponse::new(blocks)))
}

/// Fill an uploaded PDF with the `fields` values
pub async fn fill(State(state): State<AppState>, multipart: Multipart) -> Result<Response, AppError> {
    let mut upload = Upload::read(multipart).await?;
    let pdf = upload.require_file()?;
    let values = match upload.fields.as_deref() {
        Some(json) => field_values(json)?,
        None => return Err(AppError::BadRequest("no fields provided in upload".to_string())),
    };
    let blocks = match upload.blocks.as_deref() {
        Some(json) => blocks_from_json(json)?,
        None => Vec::new(),
    };

    let engine = Arc::clone(&state.engine);
    let filled = run_engine(move || engine.fill_blocks_with_report(&pdf, &blocks, &values)).await?;

    let warnings: Vec<Warning> = filled.warnings.iter().map(Warning::from).collect();
    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"filled.pdf\""),
        ],
        filled.bytes,
    )
        .into_response();

    let json = serde_json::to_vec(&warnings).map_err(|e| AppError::Internal(e.to_string()))?;
    match HeaderValue::from_bytes(&json) {
        Ok(value) => {
            response.headers_mut().insert(WARNINGS_HEADER, value);
        }
        Err(_) => tracing::warn!("warnings not representable as a header value, dropped"),
    }
    Ok(response)
}

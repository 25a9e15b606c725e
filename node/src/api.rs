//! # REST API
//!
//! Builds the axum router that exposes the key service over HTTP. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                                | Description                       |
//! |--------|-------------------------------------|-----------------------------------|
//! | GET    | `/health`                           | Liveness and extractor status     |
//! | POST   | `/process_iris`                     | Upload an image, open a session   |
//! | GET    | `/download_keys/:kind/:session_id`  | Armored private or public key     |
//! | POST   | `/sign`                             | Detached signature over a message |
//! | POST   | `/verify`                           | Check a detached signature        |
//! | DELETE | `/sessions/:session_id`             | End a session early               |

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use anarchy_auth::armor::KeyKind;
use anarchy_auth::service::{Health, VerifyTarget};
use anarchy_auth::session::short_id;
use anarchy_auth::signing;
use anarchy_auth::{KeyCustodyService, ServiceError};

use crate::metrics::{SharedMetrics, VerifyOutcome};

/// Multipart form field carrying the image.
pub const IMAGE_FIELD: &str = "iris_image";

/// Accepted upload extensions, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

/// Slack on top of the image limit for multipart framing and headers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<KeyCustodyService>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// Largest accepted image, in bytes.
    pub max_upload_bytes: usize,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, tracing and
/// the request body limit.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health_handler))
        .route("/process_iris", post(process_iris_handler))
        .route("/download_keys/:kind/:session_id", get(download_keys_handler))
        .route("/sign", post(sign_handler))
        .route("/verify", post(verify_handler))
        .route("/sessions/:session_id", delete(terminate_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SignRequest {
    pub session_id: String,
    pub message: String,
}

/// Body of `POST /verify`. Exactly one of `session_id` and `public_key`
/// names the key to check against. `public_key` is an armored public key
/// block or 64 hex characters.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    pub message: String,
    pub signature: String,
}

/// Response payload for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
    #[serde(flatten)]
    pub health: Health,
}

/// Generic error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    BadRequest(String),
    Upload(MultipartError),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError::Service(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Upload(e)
    }
}

fn service_status(e: &ServiceError) -> StatusCode {
    match e {
        ServiceError::SessionNotFound => StatusCode::NOT_FOUND,
        ServiceError::SessionExpired => StatusCode::GONE,
        ServiceError::MalformedInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::ExtractionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::InternalDerivation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Service(e) => {
                let status = service_status(&e);
                if status.is_server_error() {
                    tracing::error!(code = e.code(), "request failed: {}", e);
                }
                (status, e.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upload(e) => (e.status(), e.body_text()),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn has_allowed_extension(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 while the process is alive, with extractor
/// availability and the live session count.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.service.health();
    state.metrics.set_active_sessions(health.active_sessions);
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        health,
    })
}

/// `POST /process_iris` — multipart upload in field `iris_image`.
///
/// Extraction trouble is not an error here: the response says
/// `"method": "fallback_hash"` and carries a warning instead.
async fn process_iris_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let started = Instant::now();

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, image) =
        upload.ok_or_else(|| ApiError::BadRequest("No file uploaded".into()))?;
    if filename.is_empty() {
        return Err(ApiError::BadRequest("No file selected".into()));
    }
    if !has_allowed_extension(&filename) {
        return Err(ApiError::BadRequest(
            "Invalid file type. Please upload PNG, JPG, BMP, or TIFF".into(),
        ));
    }
    if image.len() > state.max_upload_bytes {
        return Err(ApiError::BadRequest(format!(
            "File too large: {} bytes, limit is {}",
            image.len(),
            state.max_upload_bytes
        )));
    }

    let processed = state.service.process_image(&image).await?;
    drop(image);

    state.metrics.record_session(processed.method);
    state
        .metrics
        .derivation_latency_seconds
        .observe(started.elapsed().as_secs_f64());
    state
        .metrics
        .set_active_sessions(state.service.sessions().active_count());

    Ok((StatusCode::OK, Json(processed)))
}

/// `GET /download_keys/:kind/:session_id` — armored key as an attachment.
async fn download_keys_handler(
    State(state): State<AppState>,
    Path((kind, session_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let kind: KeyKind = kind
        .parse()
        .map_err(|e: anarchy_auth::armor::ArmorError| ApiError::BadRequest(e.to_string()))?;
    let armored = state.service.download_key(&session_id, kind)?;

    let disposition = format!(
        "attachment; filename=\"anarchy-auth-{}-{}.asc\"",
        kind,
        short_id(&session_id)
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pgp-keys".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        armored,
    ))
}

/// `POST /sign` — detached signature over the UTF-8 bytes of `message`.
async fn sign_handler(
    State(state): State<AppState>,
    Json(req): Json<SignRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.message.is_empty() {
        return Err(ApiError::BadRequest("No message to sign".into()));
    }
    let signed = state.service.sign(&req.session_id, req.message.as_bytes())?;
    state.metrics.signatures_total.inc();
    Ok(Json(signed))
}

/// `POST /verify` — `{"valid": bool}`. A mismatch is a 200 with
/// `valid: false`; only unusable input is an error.
async fn verify_handler(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<impl IntoResponse> {
    let result = verify_request(&state, req);
    let outcome = match &result {
        Ok(v) if v.valid => VerifyOutcome::Valid,
        Ok(_) => VerifyOutcome::Invalid,
        Err(_) => VerifyOutcome::Rejected,
    };
    state.metrics.record_verification(outcome);
    Ok(Json(result?))
}

fn verify_request(
    state: &AppState,
    req: VerifyRequest,
) -> ApiResult<anarchy_auth::service::Verification> {
    if req.message.is_empty() {
        return Err(ApiError::BadRequest("No message to verify".into()));
    }
    let target = match (req.session_id, req.public_key) {
        (Some(id), None) => VerifyTarget::Session(id),
        (None, Some(key)) => VerifyTarget::PublicKey(
            signing::parse_public_key(&key).map_err(ServiceError::from)?,
        ),
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "Provide either session_id or public_key, not both".into(),
            ))
        }
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Provide session_id or public_key".into(),
            ))
        }
    };
    Ok(state
        .service
        .verify(&target, req.message.as_bytes(), &req.signature)?)
}

/// `DELETE /sessions/:session_id` — 204 on success.
async fn terminate_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.terminate(&session_id)?;
    state
        .metrics
        .set_active_sessions(state.service.sessions().active_count());
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

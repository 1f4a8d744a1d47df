use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use promptsync_core::sync::{
    DownloadPage, DownloadParams, StatusParams, StatusReport, SyncEngine, UploadRequest,
    UploadSummary,
};
use promptsync_core::util::user_fingerprint;
use promptsync_core::validation::ValidationErrors;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{extract_bearer_token, AuthenticatedUser, JwtVerifier};
use crate::config::AppConfig;
use crate::error::{AppError, INVALID_BODY, INVALID_QUERY};
use crate::rate_limit::{EndpointRateLimiter, ProtectedEndpoint, RateLimitMetricsSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    engine: SyncEngine,
    jwt_verifier: Arc<JwtVerifier>,
    endpoint_rate_limiter: Arc<EndpointRateLimiter>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, engine: SyncEngine) -> Self {
        Self {
            engine,
            jwt_verifier: Arc::new(JwtVerifier::from_config(&config)),
            endpoint_rate_limiter: Arc::new(EndpointRateLimiter::from_config(config.as_ref())),
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/sync/upload", post(upload))
        .route("/sync/download", get(download))
        .route("/sync/status", get(status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

/// Success envelope shared by every sync route
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    const fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    rate_limit: RateLimitMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        rate_limit: state.endpoint_rate_limiter.metrics_snapshot(),
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let user = state.jwt_verifier.verify_access_token(token)?;
    tracing::debug!(
        user = user_fingerprint(&user.user_id),
        auth_session = user.session_id.as_deref().unwrap_or("-"),
        path = %request.uri().path(),
        "Authenticated sync request"
    );
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Run a store-bound engine call off the async workers
async fn run_blocking<T, F>(operation: F) -> Result<T, promptsync_core::Error>
where
    T: Send + 'static,
    F: FnOnce() -> promptsync_core::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|error| promptsync_core::Error::Storage(format!("sync task failed: {error}")))?
}

async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UploadSummary>>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::SyncUpload, &user.user_id)
        .await?;

    let Json(request) = payload.map_err(|rejection| {
        AppError::validation(
            INVALID_BODY,
            ValidationErrors::single("body", rejection.body_text()),
        )
    })?;

    let user_hash = user_fingerprint(&user.user_id);
    let batch_size = request.prompts.len();
    let engine = state.engine.clone();
    let user_id = user.user_id.clone();
    let summary = run_blocking(move || engine.upload(&user_id, request))
        .await
        .map_err(|error| AppError::from_sync(error, INVALID_BODY))?;

    tracing::info!(
        endpoint = "sync_upload",
        user = user_hash,
        session = %summary.session_id,
        batch_size,
        uploaded = summary.uploaded,
        updated = summary.updated,
        conflicts = summary.conflicts.len(),
        "Accepted desktop upload"
    );
    Ok(ApiResponse::ok(summary))
}

async fn download(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<DownloadParams>,
) -> Result<Json<ApiResponse<DownloadPage>>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::SyncRead, &user.user_id)
        .await?;

    let engine = state.engine.clone();
    let user_id = user.user_id.clone();
    let page = run_blocking(move || engine.download(&user_id, &params))
        .await
        .map_err(|error| AppError::from_sync(error, INVALID_QUERY))?;

    tracing::info!(
        endpoint = "sync_download",
        user = user_fingerprint(&user.user_id),
        incremental = page.last_sync.is_some(),
        returned = page.prompts.len(),
        total = page.total,
        "Served download page"
    );
    Ok(ApiResponse::ok(page))
}

async fn status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<StatusParams>,
) -> Result<Json<ApiResponse<StatusReport>>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::SyncRead, &user.user_id)
        .await?;

    let engine = state.engine.clone();
    let user_id = user.user_id.clone();
    let report = run_blocking(move || engine.status(&user_id, &params))
        .await
        .map_err(|error| AppError::from_sync(error, INVALID_QUERY))?;

    tracing::debug!(
        endpoint = "sync_status",
        user = user_fingerprint(&user.user_id),
        "Served sync status"
    );
    Ok(ApiResponse::ok(report))
}

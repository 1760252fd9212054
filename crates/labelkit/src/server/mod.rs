mod auth;
mod error;
mod labels;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get, post};
use axum::{Json, Router};
use eyre::WrapErr;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};

use labelkit_core::LabelStore;

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub labels: LabelStore,
    pub api_token: String,
    /// Parent of every request's cancellation token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState, origin: &str) -> eyre::Result<Router> {
    // Only reflect the allowed origin when the request's Origin header
    // actually matches. Otherwise, omit the header entirely so browsers
    // get a clean CORS rejection instead of a mismatched origin value.
    let allowed: axum::http::HeaderValue = origin
        .parse()
        .wrap_err_with(|| format!("invalid origin header value `{origin}`"))?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |request_origin: &axum::http::HeaderValue, _| *request_origin == allowed,
        ))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::HeaderName::from_static(auth::API_TOKEN_HEADER),
        ]);

    let shared = Arc::new(state);

    let public_api = Router::new().route("/api/v1/health", get(health));

    // A label is a key and a value of at most 255 characters each; anything
    // near this limit is not a legitimate request.
    const LABEL_BODY_LIMIT: usize = 64 * 1024;

    let label_api = Router::new()
        .route("/api/v1/labels", post(labels::set_label))
        .route(
            "/api/v1/labels/service/{service_id}",
            get(labels::list_service_labels),
        )
        .route("/api/v1/labels/user/{user_id}", get(labels::list_user_labels))
        .route("/api/v1/labels/keys", get(labels::list_keys))
        .route("/api/v1/labels/values", get(labels::list_values))
        .layer(DefaultBodyLimit::max(LABEL_BODY_LIMIT));

    Ok(Router::new()
        .merge(public_api)
        .merge(label_api)
        .route("/api", any(api_not_found))
        .route("/api/{*path}", any(api_not_found))
        .layer(cors)
        .with_state(shared))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_not_found() -> error::AppError {
    error::AppError::NotFound("API route not found".to_string())
}

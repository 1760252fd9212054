use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use labelkit_core::labels::TargetRef;
use labelkit_core::{Label, Target, TargetKind};

use super::auth::request_context;
use super::error::{map_label_error, AppError};
use super::SharedState;

// ==============================================================================
// DTOs
// ==============================================================================

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct SetLabelRequest {
    target: TargetRef,
    key: String,
    /// An empty value deletes the label.
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
pub(super) struct KeysQuery {
    target_type: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct ValuesQuery {
    key: String,
    target_type: Option<String>,
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn set_label(
    State(state): State<SharedState>,
    headers: HeaderMap,
    req: Result<Json<SetLabelRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let ctx = request_context(&state, &headers);
    state.labels.authorize(&ctx).map_err(map_label_error)?;
    let Json(req) = req.map_err(|e| AppError::BadRequest(e.to_string()))?;

    let target = Target::try_from(req.target).map_err(map_label_error)?;
    state
        .labels
        .set(&ctx, &Label::new(req.key, req.value, target))
        .await
        .map_err(map_label_error)?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

pub(super) async fn list_service_labels(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(service_id): Path<String>,
) -> Result<Json<Vec<Label>>, AppError> {
    let ctx = request_context(&state, &headers);
    let labels = state
        .labels
        .find_all_by_service(&ctx, &service_id)
        .await
        .map_err(map_label_error)?;
    Ok(Json(sorted_by_key(labels)))
}

pub(super) async fn list_user_labels(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Label>>, AppError> {
    let ctx = request_context(&state, &headers);
    let labels = state
        .labels
        .find_all_by_user(&ctx, &user_id)
        .await
        .map_err(map_label_error)?;
    Ok(Json(sorted_by_key(labels)))
}

pub(super) async fn list_keys(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<KeysQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    let ctx = request_context(&state, &headers);
    state.labels.authorize(&ctx).map_err(map_label_error)?;
    let mut keys = match parse_kind(query.target_type.as_deref())? {
        Some(kind) => state.labels.unique_keys_for(&ctx, kind).await,
        None => state.labels.unique_keys(&ctx).await,
    }
    .map_err(map_label_error)?;
    keys.sort();
    Ok(Json(keys))
}

pub(super) async fn list_values(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<ValuesQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    let ctx = request_context(&state, &headers);
    state.labels.authorize(&ctx).map_err(map_label_error)?;
    let kind = parse_kind(query.target_type.as_deref())?;
    let mut values = state
        .labels
        .unique_values(&ctx, &query.key, kind)
        .await
        .map_err(map_label_error)?;
    values.sort();
    Ok(Json(values))
}

// ==============================================================================
// Helpers
// ==============================================================================

fn parse_kind(raw: Option<&str>) -> Result<Option<TargetKind>, AppError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(str::parse::<TargetKind>)
        .transpose()
        .map_err(map_label_error)
}

/// Order labels case-insensitively by key so clients get stable output.
fn sorted_by_key(mut labels: Vec<Label>) -> Vec<Label> {
    labels.sort_by(|a, b| {
        a.key
            .to_lowercase()
            .cmp(&b.key.to_lowercase())
            .then_with(|| a.key.cmp(&b.key))
    });
    labels
}

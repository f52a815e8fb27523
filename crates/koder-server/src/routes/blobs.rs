//! Blob routes: raw bytes under slash-separated keys.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use koder_core::remote::RemoteStore;
use serde_json::json;
use std::sync::Arc;

use super::ApiError;
use crate::state::AppState;

/// Create blob router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/blobs/{*key}", get(get_blob).put(put_blob))
}

/// Store bytes under a key
pub async fn put_blob(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.store_blob(&key, &body).await?;
    tracing::debug!("Stored blob {} ({} bytes)", key, body.len());
    Ok(Json(json!({ "key": key, "size": body.len() })))
}

/// Fetch the bytes under a key
pub async fn get_blob(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    match state.store.get_blob(&key).await? {
        Some(bytes) => Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response()),
        None => Err(ApiError::not_found(format!("Blob not found: {}", key))),
    }
}

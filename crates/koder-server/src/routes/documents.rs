//! Document routes: upsert by `id` and equality queries per collection.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{post, put},
};
use koder_core::remote::{DocumentQuery, RemoteStore, document_id};
use serde_json::{Value, json};
use std::sync::Arc;

use super::ApiError;
use crate::state::AppState;

/// Create document router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/collections/{collection}/documents", put(upsert_document))
        .route("/collections/{collection}/query", post(query_documents))
}

/// Upsert a document by its `id`
pub async fn upsert_document(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(document): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let id = document_id(&document)?.to_string();
    state.store.store_document(&collection, &document).await?;
    Ok(Json(json!({ "collection": collection, "id": id })))
}

/// Query a collection in store order
pub async fn query_documents(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(query): Json<DocumentQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let documents = state.store.query_documents(&collection, &query).await?;
    Ok(Json(documents))
}

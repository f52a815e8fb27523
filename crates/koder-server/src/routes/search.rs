//! Code search route.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use koder_core::remote::RemoteStore;
use koder_core::types::SearchMatch;
use serde::Deserialize;
use std::sync::Arc;

use super::ApiError;
use crate::state::AppState;

/// Create search router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/search", get(search_code))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

/// Search stored code, best match first
pub async fn search_code(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchMatch>>, ApiError> {
    let matches = state.store.search_code(&query.q).await?;
    Ok(Json(matches))
}

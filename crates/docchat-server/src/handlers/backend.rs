use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::Value;
use tracing::warn;

use crate::error::AppError;
use crate::ServerState;

/// GET /python/ping - Checks that the RAG backend is reachable.
pub async fn ping(State(state): State<Arc<ServerState>>) -> Result<Json<Value>, AppError> {
    let resp = state.backend.ping().await.map_err(|e| {
        warn!("Backend ping failed: {}", e);
        e
    })?;
    Ok(Json(resp))
}

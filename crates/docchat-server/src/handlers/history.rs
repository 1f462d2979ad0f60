//! Chat history handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use tracing::error;

use crate::dto::{ChatResponse, HistoryQuery};
use crate::error::AppError;
use crate::ServerState;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 200;

/// GET /chats - One page of history, newest page first, oldest-first within it.
pub async fn list(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatResponse>>, AppError> {
    let page = params.page.unwrap_or(0);
    let size = params.size.unwrap_or(DEFAULT_PAGE_SIZE);
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(AppError::BadRequest(format!(
            "size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let messages = state
        .db
        .recent_messages(page, size, params.user_id.as_deref())
        .map_err(|e| {
            error!("Failed to load chat history: {}", e);
            AppError::Internal("failed to load chat history".into())
        })?;

    Ok(Json(messages.into_iter().map(ChatResponse::from).collect()))
}

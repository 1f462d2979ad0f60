//! Chat HTTP handlers: single-shot answers and SSE streams.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::Json;
use docchat_core::{parse_document_ids, ChatRequest, DEFAULT_TOP_K};
use futures::{stream, Stream, StreamExt};
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use crate::dto::StreamQuery;
use crate::error::AppError;
use crate::ServerState;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// POST /chat - Answers a question in one response.
pub async fn chat(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Value>, AppError> {
    let req = req.normalize();
    req.validate()?;

    let answer = state.backend.chat(&req).await.map_err(|e| {
        error!("Chat request failed: {}", e);
        e
    })?;
    Ok(Json(answer))
}

/// POST /chats/stream - Streams an answer for a JSON request body.
pub async fn stream_post(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<KeepAliveStream<EventStream>>, AppError> {
    let req = req.normalize();
    req.validate()?;
    Ok(open_stream(&state, req))
}

/// GET /chats/stream - Streams an answer for query parameters.
pub async fn stream_get(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<StreamQuery>,
) -> Result<Sse<KeepAliveStream<EventStream>>, AppError> {
    let req = ChatRequest {
        document_ids: parse_document_ids(&params.doc_ids)?,
        document_id: None,
        question: params.q,
        top_k: params.top_k.unwrap_or(DEFAULT_TOP_K),
        model: params.model,
        document_name: params.document_name,
        user_id: params.user_id,
    };
    req.validate()?;
    Ok(open_stream(&state, req))
}

fn open_stream(state: &ServerState, req: ChatRequest) -> Sse<KeepAliveStream<EventStream>> {
    info!(
        "Streaming chat: document={} top_k={} model={}",
        req.resolved_document_id(),
        req.top_k,
        req.model_or_default()
    );

    let events: EventStream = match state.dispatcher.submit(req) {
        Ok(rx) => Box::pin(ReceiverStream::new(rx).map(Ok)),
        Err(e) => {
            let event = Event::default().event("error").data(e.to_string());
            Box::pin(stream::once(async move { Ok(event) }))
        }
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}

//! Client for the Python RAG backend that indexes documents and answers
//! questions about them.
//!
//! The [`RagBackend`] trait is the seam the server depends on; [`HttpBackend`]
//! is the production implementation.

mod http;
mod mock;
mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use docchat_core::{ChatRequest, DocChatError, Document};
use futures::Stream;
use serde_json::Value;
use thiserror::Error;

pub use http::HttpBackend;
pub use mock::{mock_answer, mock_stream, MOCK_ANSWER};
pub use sse::{SseDecoder, SseFrame, DEFAULT_EVENT};

/// Errors from backend calls.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid backend request: {0}")]
    InvalidRequest(String),
}

impl From<BackendError> for DocChatError {
    fn from(e: BackendError) -> Self {
        DocChatError::Upstream(e.to_string())
    }
}

/// Stream of server-sent events relayed from the backend.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<SseFrame, BackendError>> + Send>>;

/// Operations the service needs from the RAG backend.
#[async_trait]
pub trait RagBackend: Send + Sync {
    /// Liveness probe.
    async fn ping(&self) -> Result<Value, BackendError>;

    /// Indexes a stored document.
    async fn ingest(&self, document: &Document) -> Result<Value, BackendError>;

    /// Answers a question in one response.
    async fn chat(&self, request: &ChatRequest) -> Result<Value, BackendError>;

    /// Answers a question as a stream of events.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<FrameStream, BackendError>;
}

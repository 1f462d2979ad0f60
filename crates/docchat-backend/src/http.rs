//! reqwest implementation of [`RagBackend`].

use std::collections::VecDeque;

use async_trait::async_trait;
use docchat_core::{ChatRequest, Document};
use futures::StreamExt;
use reqwest::{header, Client, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::mock::{mock_answer, mock_stream};
use crate::{BackendError, FrameStream, RagBackend, SseDecoder};

#[derive(Serialize)]
struct IngestRequest<'a> {
    document_id: Vec<i64>,
    file_path: &'a str,
    title: &'a str,
}

#[derive(Serialize)]
struct ChatQuery<'a> {
    document_id: i64,
    question: &'a str,
    top_k: u32,
    model: &'a str,
}

impl<'a> ChatQuery<'a> {
    fn from_request(req: &'a ChatRequest) -> Self {
        Self {
            document_id: req.resolved_document_id(),
            question: &req.question,
            top_k: req.top_k,
            model: req.model_or_default(),
        }
    }
}

/// HTTP client for the RAG backend.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("HttpBackend: base_url={}", base_url);
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status { status, body })
}

#[async_trait]
impl RagBackend for HttpBackend {
    async fn ping(&self) -> Result<Value, BackendError> {
        let response = self.client.get(self.url("/ping")).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn ingest(&self, document: &Document) -> Result<Value, BackendError> {
        let file_path = document.file_path.as_deref().ok_or_else(|| {
            BackendError::InvalidRequest(format!("document {} has no stored file", document.id))
        })?;

        let request = IngestRequest {
            document_id: vec![document.id],
            file_path,
            title: &document.title,
        };

        debug!("Ingesting document {} ({})", document.id, file_path);
        let response = self.client.post(self.url("/ingest")).json(&request).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn chat(&self, request: &ChatRequest) -> Result<Value, BackendError> {
        if request.is_mock() {
            return Ok(mock_answer());
        }

        let response = self
            .client
            .post(self.url("/chat"))
            .json(&ChatQuery::from_request(request))
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<FrameStream, BackendError> {
        if request.is_mock() {
            return Ok(mock_stream());
        }

        let response = self
            .client
            .post(self.url("/chat_stream"))
            .header(header::ACCEPT, "text/event-stream")
            .json(&ChatQuery::from_request(request))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        // Carry decoder state across chunks and flush it once the body ends.
        let state = (Box::pin(response.bytes_stream()), SseDecoder::new(), VecDeque::new(), false);
        let frames = futures::stream::unfold(state, |(mut bytes, mut decoder, mut pending, mut finished)| async move {
            loop {
                if let Some(frame) = pending.pop_front() {
                    return Some((Ok(frame), (bytes, decoder, pending, finished)));
                }
                if finished {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                    Some(Err(e)) => {
                        finished = true;
                        return Some((Err(BackendError::Http(e)), (bytes, decoder, pending, finished)));
                    }
                    None => {
                        finished = true;
                        pending.extend(decoder.finish());
                    }
                }
            }
        });

        Ok(Box::pin(frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_query_wire_format() {
        let req = ChatRequest::new("what?").with_documents(vec![9, 4]);
        let json = serde_json::to_value(ChatQuery::from_request(&req)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"document_id": 9, "question": "what?", "top_k": 5, "model": "ollama"})
        );
    }

    #[test]
    fn test_base_url_trimmed() {
        let backend = HttpBackend::new("http://localhost:8000/");
        assert_eq!(backend.url("/ping"), "http://localhost:8000/ping");
    }

    #[tokio::test]
    async fn test_mock_questions_skip_network() {
        // Unroutable address: any real request would fail.
        let backend = HttpBackend::new("http://127.0.0.1:1");
        let answer = backend.chat(&ChatRequest::new("mock: hello")).await.unwrap();
        assert_eq!(answer["citations"], serde_json::json!([]));
        assert!(backend.chat_stream(&ChatRequest::new("mock: hello")).await.is_ok());
    }

    #[tokio::test]
    async fn test_ingest_requires_file() {
        let backend = HttpBackend::new("http://127.0.0.1:1");
        let doc = Document {
            id: 1,
            title: "a.pdf".into(),
            file_path: None,
            status: docchat_core::DocumentStatus::Uploaded,
            user_id: None,
            created_at: String::new(),
        };
        assert!(matches!(backend.ingest(&doc).await, Err(BackendError::InvalidRequest(_))));
    }
}

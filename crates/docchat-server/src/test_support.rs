//! In-process fakes shared by the server's tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use docchat_backend::{mock_answer, mock_stream, BackendError, FrameStream, RagBackend};
use docchat_config::ServerConfig;
use docchat_core::{ChatRequest, Document};
use docchat_store::Database;
use serde_json::{json, Value};
use tokio::sync::{Notify, Semaphore};

use crate::state::ServerState;

pub struct FakeBackend {
    fail: bool,
    block: bool,
    started: Notify,
    gate: Semaphore,
    stream_calls: AtomicUsize,
    ingest_calls: AtomicUsize,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            fail: false,
            block: false,
            started: Notify::new(),
            gate: Semaphore::new(0),
            stream_calls: AtomicUsize::new(0),
            ingest_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeBackend {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Streams wait for [`FakeBackend::release`] before answering.
    pub fn blocked() -> Self {
        Self {
            block: true,
            ..Self::default()
        }
    }

    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn release(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn ingest_calls(&self) -> usize {
        self.ingest_calls.load(Ordering::SeqCst)
    }

    fn unavailable() -> BackendError {
        BackendError::Status {
            status: 503,
            body: "backend unavailable".into(),
        }
    }
}

#[async_trait]
impl RagBackend for FakeBackend {
    async fn ping(&self) -> Result<Value, BackendError> {
        if self.fail {
            return Err(Self::unavailable());
        }
        Ok(json!({ "status": "ok" }))
    }

    async fn ingest(&self, document: &Document) -> Result<Value, BackendError> {
        self.ingest_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Self::unavailable());
        }
        Ok(json!({ "ok": true, "document_id": [document.id] }))
    }

    async fn chat(&self, _request: &ChatRequest) -> Result<Value, BackendError> {
        if self.fail {
            return Err(Self::unavailable());
        }
        Ok(mock_answer())
    }

    async fn chat_stream(&self, _request: &ChatRequest) -> Result<FrameStream, BackendError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        if self.block {
            self.started.notify_one();
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        if self.fail {
            return Err(Self::unavailable());
        }
        Ok(mock_stream())
    }
}

/// Fresh scratch directory under the system temp dir.
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("docchat-test-{}", uuid::Uuid::new_v4()))
}

pub fn test_state(backend: Arc<FakeBackend>) -> Arc<ServerState> {
    let defaults = ServerConfig::default();
    test_state_with(backend, defaults.chat_workers, defaults.chat_queue_capacity)
}

/// State whose chat dispatcher has the given pool and queue sizes.
pub fn test_state_with(backend: Arc<FakeBackend>, chat_workers: usize, chat_queue_capacity: usize) -> Arc<ServerState> {
    let config = ServerConfig {
        upload_dir: scratch_dir(),
        chat_workers,
        chat_queue_capacity,
        ..ServerConfig::default()
    };
    let db = Arc::new(Database::in_memory().expect("in-memory database"));
    Arc::new(ServerState::new(&config, db, backend))
}

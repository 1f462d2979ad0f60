//! Bounded worker pool that relays streaming chat answers.
//!
//! A fixed number of workers pull jobs from a bounded queue. When the queue
//! is full, new requests are refused instead of piling up behind the backend.

use std::sync::Arc;

use axum::response::sse::Event;
use docchat_backend::{BackendError, RagBackend};
use docchat_core::{ChatRequest, ChatRole};
use docchat_store::Database;
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Frames buffered per client before the relay waits on the client.
const CLIENT_BUFFER: usize = 64;

#[derive(Debug, PartialEq, Eq)]
pub enum DispatchError {
    Busy,
    Closed,
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Busy => write!(f, "server is busy, please try again shortly"),
            DispatchError::Closed => write!(f, "chat workers are shutting down"),
        }
    }
}

struct ChatJob {
    request_id: String,
    request: ChatRequest,
    events: mpsc::Sender<Event>,
}

enum RelayError {
    Upstream(BackendError),
    ClientGone,
}

/// Handle used by request handlers to enqueue streaming chats.
pub struct ChatDispatcher {
    queue: mpsc::Sender<ChatJob>,
}

impl ChatDispatcher {
    /// Spawns `workers` tasks sharing a queue of `capacity` pending jobs.
    pub fn spawn(workers: usize, capacity: usize, backend: Arc<dyn RagBackend>, db: Arc<Database>) -> Self {
        let (queue, rx) = mpsc::channel::<ChatJob>(capacity);
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..workers {
            let rx = Arc::clone(&rx);
            let backend = Arc::clone(&backend);
            let db = Arc::clone(&db);
            tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else {
                        break;
                    };
                    let span = info_span!("chat_job", worker = worker_id, request_id = %job.request_id);
                    process(job, backend.as_ref(), &db).instrument(span).await;
                }
                debug!("Chat worker {} stopped", worker_id);
            });
        }

        info!("Chat dispatcher started: {} workers, queue capacity {}", workers, capacity);
        Self { queue }
    }

    /// Enqueues a request and returns the receiving end of its event stream.
    pub fn submit(&self, request: ChatRequest) -> Result<mpsc::Receiver<Event>, DispatchError> {
        let (events, rx) = mpsc::channel(CLIENT_BUFFER);
        let job = ChatJob {
            request_id: uuid::Uuid::new_v4().to_string(),
            request,
            events,
        };

        match self.queue.try_send(job) {
            Ok(()) => Ok(rx),
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!("Chat queue full, rejecting request {}", job.request_id);
                Err(DispatchError::Busy)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DispatchError::Closed),
        }
    }
}

async fn process(job: ChatJob, backend: &dyn RagBackend, db: &Database) {
    if job.events.is_closed() {
        info!("Client disconnected before processing, skipping");
        return;
    }

    info!("Forwarding question to backend");
    match relay(&job, backend).await {
        Ok(answer) => {
            let user_id = job.request.user_id.as_deref();
            let saved = db
                .save_message(ChatRole::User, &job.request.question, user_id)
                .and_then(|_| db.save_message(ChatRole::Assistant, &answer, user_id));
            match saved {
                Ok(_) => info!("Answer complete ({} chars), history saved", answer.len()),
                Err(e) => error!("Failed to save chat history: {}", e),
            }
        }
        Err(RelayError::Upstream(e)) => {
            error!("Backend stream failed: {}", e);
            let _ = job.events.send(sse_event("error", &e.to_string())).await;
        }
        Err(RelayError::ClientGone) => {
            info!("Client disconnected during relay");
        }
    }
}

/// Relays backend frames to the client and returns the accumulated answer.
async fn relay(job: &ChatJob, backend: &dyn RagBackend) -> Result<String, RelayError> {
    let mut stream = backend.chat_stream(&job.request).await.map_err(RelayError::Upstream)?;
    let mut answer = String::new();

    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(RelayError::Upstream)?;
        if let Some(text) = frame.delta_text() {
            answer.push_str(&text);
        }
        let event = sse_event(&frame.event, &frame.data);
        if job.events.send(event).await.is_err() {
            return Err(RelayError::ClientGone);
        }
    }

    Ok(answer)
}

/// Builds an event, dropping carriage returns the SSE encoder cannot carry.
fn sse_event(name: &str, data: &str) -> Event {
    let name = name.replace(['\r', '\n'], "");
    Event::default().event(name).data(data.replace('\r', ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeBackend;
    use docchat_backend::MOCK_ANSWER;
    use std::time::Duration;

    async fn drain(mut rx: mpsc::Receiver<Event>) -> usize {
        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn test_stream_persists_question_and_answer() {
        let db = Arc::new(Database::in_memory().unwrap());
        let dispatcher = ChatDispatcher::spawn(2, 4, Arc::new(FakeBackend::default()), Arc::clone(&db));

        let rx = dispatcher
            .submit(ChatRequest::new("mock: hi").with_user("alice"))
            .unwrap();
        assert!(drain(rx).await > 1);

        let history = db.recent_messages(0, 10, Some("alice")).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[0].content, "mock: hi");
        assert_eq!(history[1].role, ChatRole::Assistant);
        assert_eq!(history[1].content, MOCK_ANSWER);
    }

    #[tokio::test]
    async fn test_upstream_failure_sends_error_and_skips_history() {
        let db = Arc::new(Database::in_memory().unwrap());
        let backend = Arc::new(FakeBackend::failing());
        let dispatcher = ChatDispatcher::spawn(1, 4, backend, Arc::clone(&db));

        let rx = dispatcher.submit(ChatRequest::new("hello")).unwrap();
        assert_eq!(drain(rx).await, 1);
        assert!(db.recent_messages(0, 10, None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        let db = Arc::new(Database::in_memory().unwrap());
        let backend = Arc::new(FakeBackend::blocked());
        let dispatcher = ChatDispatcher::spawn(1, 1, backend.clone(), db);

        // First job occupies the only worker, second fills the queue.
        let _first = dispatcher.submit(ChatRequest::new("one")).unwrap();
        backend.wait_started().await;
        let _second = dispatcher.submit(ChatRequest::new("two")).unwrap();

        assert_eq!(dispatcher.submit(ChatRequest::new("three")).unwrap_err(), DispatchError::Busy);
        backend.release();
    }

    #[tokio::test]
    async fn test_disconnected_client_is_skipped() {
        let db = Arc::new(Database::in_memory().unwrap());
        let backend = Arc::new(FakeBackend::blocked());
        let dispatcher = ChatDispatcher::spawn(1, 4, backend.clone(), Arc::clone(&db));

        let _first = dispatcher.submit(ChatRequest::new("one")).unwrap();
        backend.wait_started().await;
        drop(dispatcher.submit(ChatRequest::new("mock: gone").with_user("bob")).unwrap());
        backend.release();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(backend.stream_calls(), 1);
        assert!(db.recent_messages(0, 10, Some("bob")).unwrap().is_empty());
    }
}

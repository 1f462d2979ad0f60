//! Canned answers for `mock:` questions, so the front-end can be exercised
//! without a running RAG backend.

use futures::stream;
use serde_json::{json, Value};

use crate::{FrameStream, SseFrame};

pub const MOCK_ANSWER: &str = "This is a test answer generated without the RAG backend.";

pub fn mock_answer() -> Value {
    json!({ "answer": MOCK_ANSWER, "citations": [] })
}

/// Word-by-word delta frames followed by a `done` frame.
pub fn mock_stream() -> FrameStream {
    let mut frames: Vec<_> = MOCK_ANSWER
        .split_inclusive(' ')
        .map(|word| Ok(SseFrame::new("message", json!({ "type": "delta", "text": word }).to_string())))
        .collect();
    frames.push(Ok(SseFrame::new("done", json!({ "type": "done", "citations": [] }).to_string())));
    Box::pin(stream::iter(frames))
}

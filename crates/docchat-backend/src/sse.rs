//! Incremental `text/event-stream` decoder.

use serde::Deserialize;

pub const DEFAULT_EVENT: &str = "message";

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

#[derive(Deserialize)]
struct DeltaPayload {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

impl SseFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Answer text carried by a `{"type":"delta","text":..}` payload.
    pub fn delta_text(&self) -> Option<String> {
        let payload: DeltaPayload = serde_json::from_str(&self.data).ok()?;
        if payload.kind != "delta" {
            return None;
        }
        payload.text
    }
}

/// Splits a byte stream into [`SseFrame`]s.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flushes a final frame when the stream ends without a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            let line = line.trim_end_matches('\r').to_string();
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.trim().to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event.filter(|e| !e.is_empty()).unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_split_across_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.push(b"event: token\ndata: {\"type\":\"del").is_empty());
        let frames = decoder.push(b"ta\",\"text\":\"Hi\"}\n\ndata: second\n\n");

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "token");
        assert_eq!(frames[0].delta_text().as_deref(), Some("Hi"));
        assert_eq!(frames[1], SseFrame::new("message", "second"));
    }

    #[test]
    fn test_multiline_data_and_crlf() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: line one\r\ndata: line two\r\n\r\n");
        assert_eq!(frames, vec![SseFrame::new("message", "line one\nline two")]);
    }

    #[test]
    fn test_utf8_split_inside_character() {
        let text = "data: 안녕\n\n".as_bytes();
        let (a, b) = text.split_at(8);

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(a).is_empty());
        let frames = decoder.push(b);
        assert_eq!(frames[0].data, "안녕");
    }

    #[test]
    fn test_comments_and_empty_events_skipped() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\n\nevent: ping\n\nretry: 10\ndata: x\n\n");
        assert_eq!(frames, vec![SseFrame::new("message", "x")]);
    }

    #[test]
    fn test_finish_flushes_trailing_frame() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: done\ndata: {}").is_empty());
        assert_eq!(decoder.finish(), Some(SseFrame::new("done", "{}")));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_delta_text_ignores_other_payloads() {
        assert_eq!(SseFrame::new("message", r#"{"type":"done"}"#).delta_text(), None);
        assert_eq!(SseFrame::new("message", "plain text").delta_text(), None);
    }
}

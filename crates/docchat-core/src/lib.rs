//! Core domain types and error definitions for docchat.
//!
//! This crate provides the types shared by the docchat service crates:
//!
//! - [`DocChatError`] - Error type for request validation and service failures
//! - [`Document`] and [`DocumentStatus`] - Uploaded document records
//! - [`ChatMessage`] and [`ChatRole`] - Persisted chat history
//! - [`ChatRequest`] - A question asked against zero or more documents
//!
//! # Example
//!
//! ```rust
//! use docchat_core::ChatRequest;
//!
//! let req = ChatRequest::new("What is in the contract?").with_documents(vec![7, 9]);
//! assert_eq!(req.resolved_document_id(), 7);
//! assert_eq!(req.top_k, 5);
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of retrieved chunks when a request does not specify one.
pub const DEFAULT_TOP_K: u32 = 5;

/// Model name sent upstream when a request does not specify one.
pub const DEFAULT_MODEL: &str = "ollama";

/// Document id meaning "no document filter" (general chat).
pub const ALL_DOCUMENTS: i64 = 0;

const MOCK_PREFIX: &str = "mock:";

/// Errors surfaced by docchat services.
#[derive(Error, Debug)]
pub enum DocChatError {
    /// Request failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The RAG backend failed or was unreachable.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Persistence layer failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Processing state of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    /// Stored on disk, not yet indexed.
    Uploaded,
    /// Indexed by the RAG backend.
    Ingested,
    /// The last ingest attempt failed.
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "UPLOADED",
            DocumentStatus::Ingested => "INGESTED",
            DocumentStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = DocChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPLOADED" => Ok(DocumentStatus::Uploaded),
            "INGESTED" => Ok(DocumentStatus::Ingested),
            "FAILED" => Ok(DocumentStatus::Failed),
            other => Err(DocChatError::InvalidInput(format!("unknown document status: {}", other))),
        }
    }
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub file_path: Option<String>,
    pub status: DocumentStatus,
    pub user_id: Option<String>,
    /// Local ISO-8601 timestamp (`YYYY-MM-DDTHH:MM:SS`).
    pub created_at: String,
}

/// Fields needed to create a document row.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub file_path: Option<String>,
    pub user_id: Option<String>,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl FromStr for ChatRole {
    type Err = DocChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(DocChatError::InvalidInput(format!("unknown chat role: {}", other))),
        }
    }
}

/// A persisted chat history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: i64,
    pub role: ChatRole,
    pub content: String,
    pub user_id: Option<String>,
    pub created_at: String,
}

/// A question asked against zero or more documents.
///
/// Wire names are camelCase. The legacy single `documentId` field is folded
/// into `documentIds` by [`ChatRequest::normalize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub document_ids: Vec<i64>,
    #[serde(default, skip_serializing)]
    pub document_id: Option<i64>,
    #[serde(default)]
    pub question: String,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub document_name: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}

impl ChatRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            document_ids: Vec::new(),
            document_id: None,
            question: question.into(),
            top_k: DEFAULT_TOP_K,
            model: None,
            document_name: None,
            user_id: None,
        }
    }

    pub fn with_documents(mut self, ids: Vec<i64>) -> Self {
        self.document_ids = ids;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Moves a legacy `documentId` into `document_ids` when the list is empty.
    pub fn normalize(mut self) -> Self {
        if let Some(id) = self.document_id.take() {
            if self.document_ids.is_empty() {
                self.document_ids.push(id);
            }
        }
        self
    }

    /// Single document id understood by the RAG backend.
    ///
    /// Empty lists and lists containing [`ALL_DOCUMENTS`] mean general chat.
    pub fn resolved_document_id(&self) -> i64 {
        if self.document_ids.is_empty() || self.document_ids.contains(&ALL_DOCUMENTS) {
            return ALL_DOCUMENTS;
        }
        self.document_ids[0]
    }

    pub fn model_or_default(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_MODEL)
    }

    /// Mock questions are answered without contacting the backend.
    pub fn is_mock(&self) -> bool {
        self.question.trim().starts_with(MOCK_PREFIX)
    }

    pub fn validate(&self) -> Result<(), DocChatError> {
        if self.question.trim().is_empty() {
            return Err(DocChatError::InvalidInput("question must not be blank".into()));
        }
        Ok(())
    }
}

/// Parses a comma-separated id list such as `"1, 2,,3"`.
pub fn parse_document_ids(raw: &str) -> Result<Vec<i64>, DocChatError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| DocChatError::InvalidInput(format!("invalid document id: {}", s)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_document_id() {
        assert_eq!(ChatRequest::new("q").resolved_document_id(), 0);
        assert_eq!(ChatRequest::new("q").with_documents(vec![4, 0]).resolved_document_id(), 0);
        assert_eq!(ChatRequest::new("q").with_documents(vec![4, 8]).resolved_document_id(), 4);
    }

    #[test]
    fn test_deserialize_defaults_and_legacy_id() {
        let req: ChatRequest = serde_json::from_str(r#"{"documentId": 12, "question": "hi"}"#).unwrap();
        let req = req.normalize();
        assert_eq!(req.document_ids, vec![12]);
        assert_eq!(req.top_k, DEFAULT_TOP_K);
        assert_eq!(req.model_or_default(), "ollama");
        assert!(req.user_id.is_none());
    }

    #[test]
    fn test_deserialize_full_request() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"documentIds":[3,5],"question":"why","topK":2,"model":"gemini","documentName":"a.pdf","userId":"u1"}"#,
        )
        .unwrap();
        assert_eq!(req.document_ids, vec![3, 5]);
        assert_eq!(req.top_k, 2);
        assert_eq!(req.model_or_default(), "gemini");
        assert_eq!(req.document_name.as_deref(), Some("a.pdf"));
        assert_eq!(req.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_validate_blank_question() {
        assert!(ChatRequest::new("   ").validate().is_err());
        assert!(ChatRequest::new("hello").validate().is_ok());
    }

    #[test]
    fn test_is_mock() {
        assert!(ChatRequest::new("  mock: anything").is_mock());
        assert!(!ChatRequest::new("not mock: here").is_mock());
    }

    #[test]
    fn test_parse_document_ids() {
        assert_eq!(parse_document_ids("1, 2,,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_document_ids("").unwrap().is_empty());
        assert!(matches!(parse_document_ids("1,x"), Err(DocChatError::InvalidInput(_))));
    }

    #[test]
    fn test_status_and_role_strings() {
        assert_eq!("FAILED".parse::<DocumentStatus>().unwrap(), DocumentStatus::Failed);
        assert_eq!(
            serde_json::to_string(&DocumentStatus::Ingested).unwrap(),
            "\"INGESTED\""
        );
        assert_eq!("assistant".parse::<ChatRole>().unwrap(), ChatRole::Assistant);
    }

    #[test]
    fn test_unknown_status_and_role_are_rejected() {
        assert!(matches!("DONE".parse::<DocumentStatus>(), Err(DocChatError::InvalidInput(_))));
        assert!("ingested".parse::<DocumentStatus>().is_err());
        assert!("system".parse::<ChatRole>().is_err());
    }
}

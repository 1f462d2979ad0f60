use docchat_core::{ChatMessage, ChatRole, Document, DocumentStatus};
use serde::{Deserialize, Serialize};

// === Document DTOs ===

/// Document as seen by the front-end. `createAt` keeps the field name the
/// front-end already reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: i64,
    pub title: String,
    pub file_path: Option<String>,
    pub status: DocumentStatus,
    pub create_at: String,
}

impl From<Document> for DocumentResponse {
    fn from(d: Document) -> Self {
        Self {
            id: d.id,
            title: d.title,
            file_path: d.file_path,
            status: d.status,
            create_at: d.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsQuery {
    pub user_id: Option<String>,
}

// === Chat DTOs ===

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub id: i64,
    pub role: ChatRole,
    pub text: String,
    pub created_at: String,
}

impl From<ChatMessage> for ChatResponse {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id,
            role: m.role,
            text: m.content,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub user_id: Option<String>,
}

/// Query form of a streaming chat request.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    #[serde(default)]
    pub doc_ids: String,
    #[serde(default)]
    pub q: String,
    pub top_k: Option<u32>,
    pub model: Option<String>,
    pub document_name: Option<String>,
    pub user_id: Option<String>,
}

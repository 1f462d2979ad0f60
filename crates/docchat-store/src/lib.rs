//! SQLite-backed persistence for documents and chat history.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use docchat_core::{ChatMessage, ChatRole, DocChatError, Document, DocumentStatus, NewDocument};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::info;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
    #[error("Lock error")]
    Lock,
}

impl From<StoreError> for DocChatError {
    fn from(e: StoreError) -> Self {
        DocChatError::Storage(e.to_string())
    }
}

const DOCUMENT_COLUMNS: &str = "id, title, file_path, status, user_id, created_at";
const CHAT_COLUMNS: &str = "id, role, content, user_id, created_at";

/// SQLite database holding the `documents` and `chats` tables.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) the database file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        info!("Database initialized at {}", path.display());
        Ok(db)
    }

    /// Creates an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Lock)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                file_path TEXT,
                status TEXT NOT NULL DEFAULT 'UPLOADED',
                user_id TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%S', 'now', 'localtime'))
            );

            CREATE TABLE IF NOT EXISTS chats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                user_id TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%S', 'now', 'localtime'))
            );

            CREATE INDEX IF NOT EXISTS idx_documents_user ON documents(user_id);
            CREATE INDEX IF NOT EXISTS idx_chats_created ON chats(created_at DESC, id DESC);
            CREATE INDEX IF NOT EXISTS idx_chats_user ON chats(user_id);
            "#,
        )?;

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────

    /// Inserts a document with status `UPLOADED`.
    pub fn insert_document(&self, doc: &NewDocument) -> Result<Document, StoreError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO documents (title, file_path, status, user_id) VALUES (?1, ?2, ?3, ?4)",
            params![
                doc.title,
                doc.file_path,
                DocumentStatus::Uploaded.as_str(),
                doc.user_id,
            ],
        )?;
        let id = conn.last_insert_rowid();

        let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], document_from_row)?)
    }

    pub fn get_document(&self, id: i64) -> Result<Option<Document>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], document_from_row).optional()?)
    }

    /// Lists documents in upload order, optionally restricted to one owner.
    pub fn list_documents(&self, user_id: Option<&str>) -> Result<Vec<Document>, StoreError> {
        let conn = self.lock()?;

        let mut sql = format!("SELECT {} FROM documents", DOCUMENT_COLUMNS);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(uid) = user_id {
            sql.push_str(" WHERE user_id = ?");
            params_vec.push(Box::new(uid.to_string()));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), document_from_row)?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?);
        }
        Ok(docs)
    }

    /// Returns false when no such document exists.
    pub fn set_document_status(&self, id: i64, status: DocumentStatus) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE documents SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(changed > 0)
    }

    /// Deletes a document row and returns it.
    pub fn delete_document(&self, id: i64) -> Result<Option<Document>, StoreError> {
        let conn = self.lock()?;

        let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);
        let Some(doc) = conn.query_row(&sql, params![id], document_from_row).optional()? else {
            return Ok(None);
        };
        conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;

        Ok(Some(doc))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chat history
    // ─────────────────────────────────────────────────────────────────────────

    pub fn save_message(
        &self,
        role: ChatRole,
        content: &str,
        user_id: Option<&str>,
    ) -> Result<ChatMessage, StoreError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO chats (role, content, user_id) VALUES (?1, ?2, ?3)",
            params![role.as_str(), content, user_id],
        )?;
        let id = conn.last_insert_rowid();

        let sql = format!("SELECT {} FROM chats WHERE id = ?1", CHAT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], chat_from_row)?)
    }

    /// Returns page `page` of the newest-first history, each page ordered
    /// oldest to newest for display.
    pub fn recent_messages(
        &self,
        page: u32,
        size: u32,
        user_id: Option<&str>,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let conn = self.lock()?;

        let mut sql = format!("SELECT {} FROM chats", CHAT_COLUMNS);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(uid) = user_id {
            sql.push_str(" WHERE user_id = ?");
            params_vec.push(Box::new(uid.to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?");
        params_vec.push(Box::new(i64::from(size)));
        params_vec.push(Box::new(i64::from(page) * i64::from(size)));

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), chat_from_row)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        messages.reverse();
        Ok(messages)
    }
}

/// Reads a text column into an enum, failing on values it does not know.
fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = DocChatError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        file_path: row.get(2)?,
        status: parse_column(row, 3)?,
        user_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn chat_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get(0)?,
        role: parse_column(row, 1)?,
        content: row.get(2)?,
        user_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_doc(title: &str, user: Option<&str>) -> NewDocument {
        NewDocument {
            title: title.to_string(),
            file_path: Some(format!("/tmp/{}", title)),
            user_id: user.map(str::to_string),
        }
    }

    #[test]
    fn test_unknown_stored_status_is_an_error() {
        let db = Database::in_memory().unwrap();
        let doc = db.insert_document(&new_doc("a.pdf", None)).unwrap();
        db.lock()
            .unwrap()
            .execute("UPDATE documents SET status = 'ARCHIVED' WHERE id = ?1", params![doc.id])
            .unwrap();

        assert!(matches!(db.get_document(doc.id), Err(StoreError::Database(_))));
    }

    #[test]
    fn test_document_crud() {
        let db = Database::in_memory().unwrap();

        let doc = db.insert_document(&new_doc("a.pdf", Some("alice"))).unwrap();
        assert_eq!(doc.status, DocumentStatus::Uploaded);
        assert_eq!(doc.title, "a.pdf");
        assert_eq!(doc.created_at.len(), "2025-01-01T00:00:00".len());

        assert!(db.set_document_status(doc.id, DocumentStatus::Ingested).unwrap());
        let fetched = db.get_document(doc.id).unwrap().unwrap();
        assert_eq!(fetched.status, DocumentStatus::Ingested);

        let removed = db.delete_document(doc.id).unwrap().unwrap();
        assert_eq!(removed.id, doc.id);
        assert!(db.get_document(doc.id).unwrap().is_none());
        assert!(db.delete_document(doc.id).unwrap().is_none());
        assert!(!db.set_document_status(doc.id, DocumentStatus::Failed).unwrap());
    }

    #[test]
    fn test_list_documents_by_owner() {
        let db = Database::in_memory().unwrap();
        db.insert_document(&new_doc("a.pdf", Some("alice"))).unwrap();
        db.insert_document(&new_doc("b.pdf", Some("bob"))).unwrap();
        db.insert_document(&new_doc("c.pdf", None)).unwrap();

        let all = db.list_documents(None).unwrap();
        assert_eq!(all.iter().map(|d| d.title.as_str()).collect::<Vec<_>>(), vec!["a.pdf", "b.pdf", "c.pdf"]);

        let bob = db.list_documents(Some("bob")).unwrap();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].title, "b.pdf");
    }

    #[test]
    fn test_recent_messages_paging() {
        let db = Database::in_memory().unwrap();
        for i in 0..5 {
            db.save_message(ChatRole::User, &format!("m{}", i), Some("alice")).unwrap();
        }
        db.save_message(ChatRole::Assistant, "other", Some("bob")).unwrap();

        // Newest two for alice, displayed oldest first.
        let page0 = db.recent_messages(0, 2, Some("alice")).unwrap();
        assert_eq!(page0.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), vec!["m3", "m4"]);

        let page1 = db.recent_messages(1, 2, Some("alice")).unwrap();
        assert_eq!(page1.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), vec!["m1", "m2"]);

        let page2 = db.recent_messages(2, 2, Some("alice")).unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].content, "m0");

        let everyone = db.recent_messages(0, 20, None).unwrap();
        assert_eq!(everyone.len(), 6);
        assert_eq!(everyone.last().unwrap().role, ChatRole::Assistant);
    }
}

//! Document upload, ingest and removal.

use std::path::Path;

use axum::body::Bytes;
use docchat_core::{Document, DocumentStatus, NewDocument};
use tracing::{info, warn};

use crate::error::AppError;
use crate::ServerState;

const DEFAULT_TITLE: &str = "untitled.pdf";

/// A file received from a multipart upload.
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    fn title(&self) -> String {
        self.file_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_TITLE)
            .to_string()
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.bytes.is_empty() {
            return Err(AppError::BadRequest(format!("file {} is empty", self.title())));
        }
        if !self.title().to_lowercase().ends_with(".pdf") {
            return Err(AppError::BadRequest(format!(
                "only PDF files can be uploaded: {}",
                self.title()
            )));
        }
        Ok(())
    }
}

/// Stores every file, records it and asks the backend to index it.
///
/// All files are validated before any is written. Ingest failures are
/// recorded on the document but do not fail the upload. If a file cannot be
/// recorded, its stored copy is removed; files before it stay uploaded.
pub async fn upload_many(
    state: &ServerState,
    files: Vec<UploadedFile>,
    user_id: Option<String>,
) -> Result<Vec<Document>, AppError> {
    if files.is_empty() {
        return Err(AppError::BadRequest("no files were uploaded".into()));
    }
    for file in &files {
        file.validate()?;
    }

    tokio::fs::create_dir_all(&state.upload_dir).await?;
    let upload_dir = tokio::fs::canonicalize(&state.upload_dir).await?;

    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        let target = upload_dir.join(format!("{}.pdf", uuid::Uuid::new_v4()));
        let stored = match tokio::fs::write(&target, &file.bytes).await {
            Ok(()) => record(state, &file, &target, user_id.clone()).await,
            Err(e) => Err(e.into()),
        };
        match stored {
            Ok(doc) => documents.push(doc),
            Err(e) => {
                discard(&target).await;
                return Err(e);
            }
        }
    }

    Ok(documents)
}

async fn record(
    state: &ServerState,
    file: &UploadedFile,
    target: &Path,
    user_id: Option<String>,
) -> Result<Document, AppError> {
    let doc = state.db.insert_document(&NewDocument {
        title: file.title(),
        file_path: Some(target.to_string_lossy().into_owned()),
        user_id,
    })?;
    info!("Stored document {} ({}, {} bytes)", doc.id, doc.title, file.bytes.len());

    let id = doc.id;
    match ingest(state, doc).await {
        Ok(doc) => Ok(doc),
        Err(e) => {
            if let Err(cleanup) = state.db.delete_document(id) {
                warn!("Failed to drop document {} after error: {}", id, cleanup);
            }
            Err(e)
        }
    }
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove stored file {}: {}", path.display(), e),
    }
}

/// Re-runs ingest for an existing document. Backend failures are returned.
pub async fn reingest(state: &ServerState, id: i64) -> Result<Document, AppError> {
    let doc = state
        .db
        .get_document(id)?
        .ok_or_else(|| AppError::NotFound(format!("document {} not found", id)))?;
    if doc.file_path.is_none() {
        return Err(AppError::BadRequest(format!("document {} has no stored file", id)));
    }

    match state.backend.ingest(&doc).await {
        Ok(_) => set_status(state, doc, DocumentStatus::Ingested),
        Err(e) => {
            warn!("Reingest of document {} failed: {}", id, e);
            state.db.set_document_status(id, DocumentStatus::Failed)?;
            Err(e.into())
        }
    }
}

/// Removes the document row and its stored file.
pub async fn delete(state: &ServerState, id: i64) -> Result<(), AppError> {
    let doc = state
        .db
        .delete_document(id)?
        .ok_or_else(|| AppError::NotFound(format!("document {} not found", id)))?;

    if let Some(path) = &doc.file_path {
        discard(Path::new(path)).await;
    }
    info!("Deleted document {} ({})", doc.id, doc.title);
    Ok(())
}

async fn ingest(state: &ServerState, doc: Document) -> Result<Document, AppError> {
    match state.backend.ingest(&doc).await {
        Ok(resp) => {
            info!("Ingest accepted for document {}: {}", doc.id, resp);
            set_status(state, doc, DocumentStatus::Ingested)
        }
        Err(e) => {
            warn!("Ingest failed for document {}: {}", doc.id, e);
            set_status(state, doc, DocumentStatus::Failed)
        }
    }
}

fn set_status(state: &ServerState, mut doc: Document, status: DocumentStatus) -> Result<Document, AppError> {
    state.db.set_document_status(doc.id, status)?;
    doc.status = status;
    Ok(doc)
}

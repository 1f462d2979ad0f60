//! Document HTTP handlers.

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use tracing::{error, info};

use crate::dto::{DocumentResponse, ListDocumentsQuery};
use crate::error::AppError;
use crate::services::documents::{self as document_service, UploadedFile};
use crate::ServerState;

/// GET /documents - Lists documents, optionally for one user.
pub async fn list(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<ListDocumentsQuery>,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let docs = state.db.list_documents(params.user_id.as_deref()).map_err(|e| {
        error!("Failed to list documents: {}", e);
        AppError::Internal("failed to list documents".into())
    })?;
    Ok(Json(docs.into_iter().map(DocumentResponse::from).collect()))
}

/// POST /documents/uploads - Multipart `files` plus `userId`.
///
/// When several `userId` parts are sent, the first one applies to every file.
pub async fn upload(
    State(state): State<Arc<ServerState>>,
    mut multipart: Multipart,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let mut files = Vec::new();
    let mut user_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("files") => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                files.push(UploadedFile { file_name, bytes });
            }
            Some("userId") => {
                let value = field.text().await?;
                if user_id.is_none() && !value.trim().is_empty() {
                    user_id = Some(value.trim().to_string());
                }
            }
            _ => {}
        }
    }

    info!("Upload of {} file(s) for user {:?}", files.len(), user_id);
    let docs = document_service::upload_many(&state, files, user_id).await?;
    Ok(Json(docs.into_iter().map(DocumentResponse::from).collect()))
}

/// POST /documents/{id}/reingest
pub async fn reingest(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> Result<Json<DocumentResponse>, AppError> {
    let doc = document_service::reingest(&state, id).await?;
    Ok(Json(doc.into()))
}

/// DELETE /documents/{id}/delete
pub async fn delete(State(state): State<Arc<ServerState>>, Path(id): Path<i64>) -> Result<(), AppError> {
    document_service::delete(&state, id).await
}

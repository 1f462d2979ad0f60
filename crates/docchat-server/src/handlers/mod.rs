//! HTTP route handlers for the docchat server.

pub mod backend;
pub mod chat;
pub mod documents;
pub mod history;

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use docchat_backend::{HttpBackend, RagBackend};
use docchat_config::ServerConfig;
use docchat_store::Database;

use crate::dispatcher::ChatDispatcher;

pub struct ServerState {
    pub db: Arc<Database>,
    pub backend: Arc<dyn RagBackend>,
    pub dispatcher: ChatDispatcher,
    pub upload_dir: PathBuf,
}

impl ServerState {
    pub fn new(config: &ServerConfig, db: Arc<Database>, backend: Arc<dyn RagBackend>) -> Self {
        let dispatcher = ChatDispatcher::spawn(
            config.chat_workers,
            config.chat_queue_capacity,
            Arc::clone(&backend),
            Arc::clone(&db),
        );
        Self {
            db,
            backend,
            dispatcher,
            upload_dir: config.upload_dir.clone(),
        }
    }

    /// Opens the database and connects the HTTP backend described by `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let db = Database::open(&config.database_path)
            .with_context(|| format!("failed to open database at {}", config.database_path))?;
        let backend = HttpBackend::new(&config.python_base_url);
        Ok(Self::new(config, Arc::new(db), Arc::new(backend)))
    }
}

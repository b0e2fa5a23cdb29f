//! Conversation registry with JSON persistence

use crate::context::ContextManager;
use crate::state::{ConversationState, Turn};
use crate::summarizer::Summarizer;
use dashmap::DashMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use steveai_core::{ConversationId, Error, MemoryConfig, Result};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

/// One conversation. The mutex serializes `record_turn`/`build_context`.
pub struct Conversation {
    pub id: ConversationId,
    manager: Mutex<ContextManager>,
}

impl Conversation {
    pub fn new(id: ConversationId, manager: ContextManager) -> Self {
        Self { id, manager: Mutex::new(manager) }
    }

    pub async fn lock(&self) -> MutexGuard<'_, ContextManager> {
        self.manager.lock().await
    }

    pub async fn snapshot(&self) -> ConversationState {
        self.manager.lock().await.state().clone()
    }

    /// Export document: id, timestamp, summary and held turns.
    pub async fn export(&self) -> ExportDocument {
        let manager = self.manager.lock().await;
        ExportDocument {
            conversation: self.id.clone(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            summary: manager.summary().map(String::from),
            turn_counter: manager.turn_counter(),
            turns: manager.turns().cloned().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExportDocument {
    pub conversation: ConversationId,
    pub exported_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub turn_counter: u64,
    pub turns: Vec<Turn>,
}

pub struct ConversationRegistry {
    conversations: DashMap<ConversationId, Arc<Conversation>>,
    config: MemoryConfig,
    summarizer: Arc<dyn Summarizer>,
    data_dir: Option<PathBuf>,
}

impl ConversationRegistry {
    pub fn new(config: MemoryConfig, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            conversations: DashMap::new(),
            config,
            summarizer,
            data_dir: None,
        }
    }

    /// Persist conversations as `<dir>/<id>.json`.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Path of the persisted state, if persistence is enabled.
    pub fn state_path(&self, id: &ConversationId) -> Result<Option<PathBuf>> {
        self.file_in_data_dir(id, "")
    }

    /// Default target for `/export`.
    pub fn export_path(&self, id: &ConversationId) -> Result<Option<PathBuf>> {
        self.file_in_data_dir(id, "-export")
    }

    fn file_in_data_dir(&self, id: &ConversationId, suffix: &str) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.data_dir else {
            return Ok(None);
        };
        if !id.is_file_safe() {
            return Err(Error::Config(format!("conversation id {:?} is not a valid file name", id.as_str())));
        }
        Ok(Some(dir.join(format!("{}{}.json", id, suffix))))
    }

    /// Existing conversation, or one restored from disk, or a fresh one.
    pub fn get_or_load(&self, id: &ConversationId) -> Result<Arc<Conversation>> {
        if let Some(existing) = self.get(id) {
            return Ok(existing);
        }
        let path = self.state_path(id)?;
        let conversation = self
            .conversations
            .entry(id.clone())
            .or_insert_with(|| {
                let state = path.as_deref().map(load_state).unwrap_or_default();
                let manager = ContextManager::restore(self.config.clone(), self.summarizer.clone(), state);
                info!("Conversation {} opened ({} turns)", id, manager.turn_counter());
                Arc::new(Conversation::new(id.clone(), manager))
            })
            .clone();
        Ok(conversation)
    }

    pub fn get(&self, id: &ConversationId) -> Option<Arc<Conversation>> {
        self.conversations.get(id).map(|c| c.clone())
    }

    pub fn remove(&self, id: &ConversationId) -> Option<Arc<Conversation>> {
        self.conversations.remove(id).map(|(_, c)| c)
    }

    /// Write a conversation's state to disk. No-op without a data dir.
    pub async fn save(&self, id: &ConversationId) -> Result<()> {
        let Some(path) = self.state_path(id)? else {
            return Ok(());
        };
        let conversation = self
            .get(id)
            .ok_or_else(|| Error::ConversationNotFound(id.to_string()))?;
        let json = conversation.snapshot().await.to_json()?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, json).await?;
        Ok(())
    }

    /// Write the export document to `path`.
    pub async fn export_to(&self, id: &ConversationId, path: &Path) -> Result<()> {
        let conversation = self
            .get(id)
            .ok_or_else(|| Error::ConversationNotFound(id.to_string()))?;
        let json = serde_json::to_string_pretty(&conversation.export().await)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await?;
        info!("Exported conversation {} to {}", id, path.display());
        Ok(())
    }
}

/// Read persisted state. Missing files start empty silently; unreadable or
/// unparseable ones are logged and start empty. Invariant checks happen in `ContextManager::restore`.
fn load_state(path: &Path) -> ConversationState {
    match std::fs::read_to_string(path) {
        Ok(json) => match ConversationState::from_json(&json) {
            Ok(state) => state,
            Err(e) => {
                warn!("Ignoring unreadable conversation file {}: {}", path.display(), e);
                ConversationState::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => ConversationState::default(),
        Err(e) => {
            warn!("Cannot read conversation file {}: {}", path.display(), e);
            ConversationState::default()
        }
    }
}

//! Persistence adapter for the conversation collection
//!
//! The whole collection lives under a single key: one JSON array. Nothing is
//! migrated or indexed. A missing or unreadable file loads as an empty
//! collection.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::error::StoreError;
use crate::state::Conversation;

pub trait ConversationRepository {
    /// Load the stored collection, newest first. Never fails.
    fn load(&self) -> Vec<Conversation>;

    /// Replace the stored collection.
    fn save(&self, conversations: &[Conversation]) -> Result<(), StoreError>;
}

/// Stores the collection as a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Repository at the default location in the user's config directory
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("askai").join("conversations.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConversationRepository for JsonFileRepository {
    fn load(&self) -> Vec<Conversation> {
        if !self.path.exists() {
            return Vec::new();
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not read conversations, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(conversations) => conversations,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not parse conversations, starting empty");
                Vec::new()
            }
        }
    }

    fn save(&self, conversations: &[Conversation]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write then rename so a crash never leaves a half-written file
        let content = serde_json::to_string_pretty(conversations)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Keeps the collection in memory.
///
/// Clones share the same buffer, so a test can hand one clone to a store and
/// inspect what was saved through the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    saved: Arc<Mutex<Vec<Conversation>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversations(conversations: Vec<Conversation>) -> Self {
        Self {
            saved: Arc::new(Mutex::new(conversations)),
        }
    }

    pub fn snapshot(&self) -> Vec<Conversation> {
        self.saved
            .lock()
            .map(|saved| saved.clone())
            .unwrap_or_default()
    }
}

impl ConversationRepository for MemoryRepository {
    fn load(&self) -> Vec<Conversation> {
        self.snapshot()
    }

    fn save(&self, conversations: &[Conversation]) -> Result<(), StoreError> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
        *saved = conversations.to_vec();
        Ok(())
    }
}

/// Loads nothing and refuses every save
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FailingRepository;

#[cfg(test)]
impl ConversationRepository for FailingRepository {
    fn load(&self) -> Vec<Conversation> {
        Vec::new()
    }

    fn save(&self, _conversations: &[Conversation]) -> Result<(), StoreError> {
        Err(StoreError::Persistence("disk full".to_string()))
    }
}

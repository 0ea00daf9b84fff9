//! Scratchpad store backends.
//!
//! Both backends replace a run's scratchpad as one unit. The in-memory
//! store swaps the whole Vec under a lock; the file store writes a temp
//! file and renames it over the previous snapshot.

use async_trait::async_trait;
use codeact_core::error::MemoryError;
use codeact_core::message::Message;
use codeact_core::store::{RunId, ScratchpadStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

/// Scratchpads held in process memory, keyed by run and key.
#[derive(Clone, Default)]
pub struct InMemoryScratchpadStore {
    pads: Arc<RwLock<HashMap<(RunId, String), Vec<Message>>>>,
}

impl InMemoryScratchpadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (run, key) slots currently held.
    pub async fn len(&self) -> usize {
        self.pads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pads.read().await.is_empty()
    }
}

#[async_trait]
impl ScratchpadStore for InMemoryScratchpadStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn read(&self, run: &RunId, key: &str) -> Result<Vec<Message>, MemoryError> {
        let pads = self.pads.read().await;
        Ok(pads
            .get(&(run.clone(), key.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn replace(&self, run: &RunId, key: &str, messages: Vec<Message>) -> Result<(), MemoryError> {
        trace!(run_id = %run, key, count = messages.len(), "Replacing scratchpad");
        self.pads
            .write()
            .await
            .insert((run.clone(), key.to_string()), messages);
        Ok(())
    }

    async fn remove_run(&self, run: &RunId) -> Result<(), MemoryError> {
        self.pads.write().await.retain(|(r, _), _| r != run);
        Ok(())
    }
}

/// Scratchpads persisted as JSON documents: `{root}/{run_id}/{key}.json`.
pub struct FileScratchpadStore {
    root: PathBuf,
    // Serializes replace/remove so a rename never races a directory removal.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileScratchpadStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn run_dir(&self, run: &RunId) -> PathBuf {
        self.root.join(sanitize(run.as_str()))
    }

    fn pad_path(&self, run: &RunId, key: &str) -> PathBuf {
        self.run_dir(run).join(format!("{}.json", sanitize(key)))
    }
}

/// Restrict a name to a safe single path component.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "_".into() } else { cleaned }
}

async fn write_atomically(path: &Path, bytes: Vec<u8>) -> Result<(), MemoryError> {
    let parent = path
        .parent()
        .ok_or_else(|| MemoryError::Storage(format!("No parent directory for {}", path.display())))?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| MemoryError::Storage(format!("Failed to create scratchpad directory: {e}")))?;

    let tmp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| MemoryError::Storage(format!("Failed to write scratchpad: {e}")))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(MemoryError::Storage(format!("Failed to commit scratchpad: {e}")));
    }
    Ok(())
}

#[async_trait]
impl ScratchpadStore for FileScratchpadStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn read(&self, run: &RunId, key: &str) -> Result<Vec<Message>, MemoryError> {
        let path = self.pad_path(run, key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MemoryError::Storage(format!("Failed to read scratchpad: {e}"))),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| MemoryError::Corrupt(format!("{}: {e}", path.display())))
    }

    async fn replace(&self, run: &RunId, key: &str, messages: Vec<Message>) -> Result<(), MemoryError> {
        let bytes = serde_json::to_vec(&messages)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize scratchpad: {e}")))?;
        let path = self.pad_path(run, key);

        let _guard = self.write_lock.lock().await;
        write_atomically(&path, bytes).await?;
        debug!(run_id = %run, key, count = messages.len(), "Scratchpad persisted");
        Ok(())
    }

    async fn remove_run(&self, run: &RunId) -> Result<(), MemoryError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_dir_all(self.run_dir(run)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MemoryError::Storage(format!("Failed to remove run scratchpads: {e}"))),
        }
    }
}

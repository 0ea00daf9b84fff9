//! File-based chat memory: persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `Message`. Appends go to the end of the file,
//! so a flush from finalize is a single write of the new lines.
//!
//! Storage location: `~/.codeact/memory/chat.jsonl`

use async_trait::async_trait;
use codeact_core::error::MemoryError;
use codeact_core::memory::ChatMemory;
use codeact_core::message::Message;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A file-backed chat memory using JSONL (one message per line).
///
/// Messages are loaded into memory on creation; appends are written through
/// to disk before the call returns.
pub struct FileChatMemory {
    path: PathBuf,
    messages: Arc<RwLock<Vec<Message>>>,
}

impl FileChatMemory {
    /// Open a file-based memory at the given path.
    ///
    /// If the file exists, messages are loaded from it.
    /// If not, starts empty (file created on first write).
    pub fn new(path: PathBuf) -> Self {
        let messages = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = messages.len(), "File chat memory loaded");
        Self {
            path,
            messages: Arc::new(RwLock::new(messages)),
        }
    }

    fn load_from_disk(path: &Path) -> Vec<Message> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<Message>(line) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted chat memory line");
                    None
                }
            })
            .collect()
    }

    fn ensure_parent(&self) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChatMemory for FileChatMemory {
    fn name(&self) -> &str {
        "file"
    }

    async fn put_messages(&self, messages: Vec<Message>) -> Result<(), MemoryError> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut content = String::new();
        for msg in &messages {
            let line = serde_json::to_string(msg).map_err(|e| {
                MemoryError::Storage(format!("Failed to serialize message: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        // Hold the write lock across the disk append so the file and the
        // in-memory view stay in the same order.
        let mut guard = self.messages.write().await;
        self.ensure_parent()?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open memory file: {e}")))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to append memory file: {e}")))?;
        file.flush()
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to flush memory file: {e}")))?;

        debug!(count = messages.len(), path = %self.path.display(), "Appended to chat memory");
        guard.extend(messages);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(self.messages.read().await.clone())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.messages.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        let mut guard = self.messages.write().await;
        self.ensure_parent()?;
        tokio::fs::write(&self.path, b"")
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to truncate memory file: {e}")))?;
        guard.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory").join("chat.jsonl");

        {
            let mem = FileChatMemory::new(path.clone());
            mem.put(Message::user("What is 1+1?")).await.unwrap();
            mem.put_messages(vec![
                Message::assistant("<execute>print(1+1)</execute>"),
                Message::user("Result of executing the code given:\n\n2"),
            ])
            .await
            .unwrap();
        }

        let reopened = FileChatMemory::new(path);
        let all = reopened.get_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].content, "What is 1+1?");
        assert!(all[2].content.ends_with("\n\n2"));
    }

    #[tokio::test]
    async fn corrupted_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.jsonl");
        let good = serde_json::to_string(&Message::user("ok")).unwrap();
        std::fs::write(&path, format!("{good}\nnot json\n")).unwrap();

        let mem = FileChatMemory::new(path);
        assert_eq!(mem.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clear_truncates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.jsonl");
        let mem = FileChatMemory::new(path.clone());
        mem.put(Message::user("forget me")).await.unwrap();
        mem.clear().await.unwrap();

        assert_eq!(mem.count().await.unwrap(), 0);
        assert_eq!(FileChatMemory::new(path).count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_put_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.jsonl");
        let mem = FileChatMemory::new(path.clone());
        mem.put_messages(vec![]).await.unwrap();
        assert!(!path.exists());
    }
}

//! Run-scoped scratchpad handle.
//!
//! Wraps a [`ScratchpadStore`] slot addressed by run id and key. Reads
//! return an owned copy; writes replace the whole list at once, so callers
//! build the next state locally and persist it in a single call.

use std::sync::Arc;

use codeact_core::error::MemoryError;
use codeact_core::message::Message;
use codeact_core::store::{RunId, ScratchpadStore};
use tracing::trace;

#[derive(Clone)]
pub struct Scratchpad {
    store: Arc<dyn ScratchpadStore>,
    run_id: RunId,
    key: String,
}

impl Scratchpad {
    pub fn new(store: Arc<dyn ScratchpadStore>, run_id: RunId, key: impl Into<String>) -> Self {
        Self {
            store,
            run_id,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current contents; empty if nothing was written yet.
    pub async fn read(&self) -> Result<Vec<Message>, MemoryError> {
        self.store.read(&self.run_id, &self.key).await
    }

    /// Replace the contents with `messages`.
    pub async fn replace(&self, messages: Vec<Message>) -> Result<(), MemoryError> {
        trace!(run_id = %self.run_id, key = %self.key, count = messages.len(), "Writing scratchpad");
        self.store.replace(&self.run_id, &self.key, messages).await
    }

    /// Read, append `messages`, and persist. Returns the new contents.
    pub async fn extend(&self, messages: Vec<Message>) -> Result<Vec<Message>, MemoryError> {
        let mut current = self.read().await?;
        current.extend(messages);
        self.replace(current.clone()).await?;
        Ok(current)
    }

    pub async fn clear(&self) -> Result<(), MemoryError> {
        self.replace(Vec::new()).await
    }
}

impl std::fmt::Debug for Scratchpad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scratchpad")
            .field("store", &self.store.name())
            .field("run_id", &self.run_id)
            .field("key", &self.key)
            .finish()
    }
}

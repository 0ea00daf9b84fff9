//! In-memory chat memory: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use codeact_core::error::MemoryError;
use codeact_core::memory::ChatMemory;
use codeact_core::message::Message;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A chat memory that keeps messages in a Vec.
/// Useful for testing and sessions where persistence isn't needed.
#[derive(Clone, Default)]
pub struct InMemoryChatMemory {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl InMemoryChatMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the stored messages.
    pub async fn snapshot(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl ChatMemory for InMemoryChatMemory {
    fn name(&self) -> &str { "in_memory" }

    async fn put_messages(&self, messages: Vec<Message>) -> Result<(), MemoryError> {
        self.messages.write().await.extend(messages);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(self.messages.read().await.clone())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.messages.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.messages.write().await.clear();
        Ok(())
    }
}

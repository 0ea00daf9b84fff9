//! No-op memory backend: disables long-term memory entirely.

use async_trait::async_trait;
use codeact_core::error::MemoryError;
use codeact_core::memory::ChatMemory;
use codeact_core::message::Message;

/// A no-op chat memory that stores nothing.
pub struct NoopMemory;

#[async_trait]
impl ChatMemory for NoopMemory {
    fn name(&self) -> &str { "none" }

    async fn put_messages(&self, _messages: Vec<Message>) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Message>, MemoryError> {
        Ok(Vec::new())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        Ok(())
    }
}

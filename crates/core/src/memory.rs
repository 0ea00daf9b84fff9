//! Memory trait: long-term conversation storage.
//!
//! Long-term memory is append-only from the agent's point of view. The
//! code-act loop writes to it exactly once per run, when the scratchpad is
//! flushed at finalize; the runner reads it to build the next run's history.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::message::Message;

/// The core ChatMemory trait.
///
/// Implementations: in-memory (for testing), JSONL file, none (no-op).
#[async_trait]
pub trait ChatMemory: Send + Sync {
    /// The backend name (e.g., "file", "in_memory", "none").
    fn name(&self) -> &str;

    /// Append messages, in order.
    async fn put_messages(&self, messages: Vec<Message>) -> std::result::Result<(), MemoryError>;

    /// Append a single message.
    async fn put(&self, message: Message) -> std::result::Result<(), MemoryError> {
        self.put_messages(vec![message]).await
    }

    /// All stored messages, oldest first.
    async fn get_all(&self) -> std::result::Result<Vec<Message>, MemoryError>;

    /// Number of stored messages.
    async fn count(&self) -> std::result::Result<usize, MemoryError> {
        Ok(self.get_all().await?.len())
    }

    /// Clear all messages.
    async fn clear(&self) -> std::result::Result<(), MemoryError>;
}

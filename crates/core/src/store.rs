//! Run-scoped scratchpad storage.
//!
//! The scratchpad holds the turns a run has produced but not yet committed
//! to long-term memory. It is exclusively owned by one run and is only ever
//! read whole and replaced whole, so every persisted state is a complete
//! snapshot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MemoryError;
use crate::message::Message;

/// Unique identifier for one agent run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read/replace storage for per-run scratchpads.
///
/// `replace` must be atomic: after it returns (or fails), a `read` yields
/// either the old snapshot or the new one, never a mix.
#[async_trait]
pub trait ScratchpadStore: Send + Sync {
    /// The backend name.
    fn name(&self) -> &str;

    /// The scratchpad stored under `key` for `run`, empty if none exists.
    async fn read(&self, run: &RunId, key: &str) -> std::result::Result<Vec<Message>, MemoryError>;

    /// Replace the scratchpad stored under `key` for `run`.
    async fn replace(
        &self,
        run: &RunId,
        key: &str,
        messages: Vec<Message>,
    ) -> std::result::Result<(), MemoryError>;

    /// Drop every scratchpad belonging to `run`.
    async fn remove_run(&self, run: &RunId) -> std::result::Result<(), MemoryError>;
}

//! Memory system implementations for codeact.
//!
//! Two concerns live here: long-term chat memory (`ChatMemory`) and the
//! run-scoped scratchpad store (`ScratchpadStore`).

pub mod noop;
pub mod in_memory;
pub mod file_backend;
pub mod scratchpad;

pub use noop::NoopMemory;
pub use in_memory::InMemoryChatMemory;
pub use file_backend::FileChatMemory;
pub use scratchpad::{FileScratchpadStore, InMemoryScratchpadStore};

//! # codeact Core
//!
//! Domain types, traits, and error definitions for the codeact agent runtime.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the code-act step loop is a trait here. The language
//! model, long-term memory, the run-scoped scratchpad store, and the code
//! executor all live behind narrow interfaces so the loop can be tested with
//! scripted stand-ins and deployed against real backends unchanged.

pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod provider;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ConfigurationError, Error, ProtocolError, Result};
pub use event::{AgentEvent, EventBus};
pub use memory::ChatMemory;
pub use message::{ContentBlock, Message, MessageToolCall, Role};
pub use provider::{LanguageModel, Provider, ProviderRequest, StreamChunk, ToolCallingProvider};
pub use store::{RunId, ScratchpadStore};
pub use tool::{
    CodeExecutor, ExecutionResult, FunctionSignature, ParamSpec, Tool, ToolCallResult, ToolOutput,
    ToolSelection,
};

//! LLM Provider implementations for codeact.
//!
//! All providers implement `codeact_core::ToolCallingProvider`.
//! The router selects the correct provider based on configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config, build_router, model_for};

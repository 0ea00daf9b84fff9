//! Error types for the codeact domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant; configuration and
//! protocol errors are fatal and abort the current step.

use thiserror::Error;

/// The top-level error type for all codeact operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Agent configuration errors ---
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    // --- Orchestration protocol errors ---
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Configuration and protocol errors are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Protocol(_))
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// The agent was set up with something it cannot support.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("a code executor must be provided to a code-act agent")]
    MissingExecutor,

    #[error(
        "tool '{tool_name}' requires run context; code-act agents only support tools that do not require context"
    )]
    ToolRequiresContext { tool_name: String },

    #[error(
        "tool '{tool_name}' is not a function tool; code-act agents only support plain functions and function tools"
    )]
    UnsupportedTool { tool_name: String },

    #[error("provider '{provider}' must support native tool calling to use handoff")]
    ToolCallingUnsupported { provider: String },

    #[error("invalid prompt template: {reason}")]
    InvalidTemplate { reason: String },
}

/// The surrounding orchestration broke the step contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown tool name in tool result: {tool_name} (call {tool_id})")]
    UnknownToolResult { tool_name: String, tool_id: String },

    #[error("tool results delivered while run is {phase}")]
    UnexpectedToolResults { phase: String },

    #[error("run {run_id} has already been finalized")]
    RunFinalized { run_id: String },

    #[error("run {run_id} already has a step in progress")]
    StepInProgress { run_id: String },
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed tool call from provider: {0}")]
    MalformedToolCall(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool {tool_name} needs run context to be called")]
    ContextRequired { tool_name: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

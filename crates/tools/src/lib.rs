//! Tool implementations for codeact.
//!
//! - [`FunctionTool`]: wraps an async closure plus its callable contract;
//!   the only kind of user tool a code-act agent can expose to generated code.
//! - [`ExecuteTool`]: adapts a [`CodeExecutor`](codeact_core::tool::CodeExecutor)
//!   into the `execute` control tool.
//! - [`HandoffTool`]: the `handoff` control tool.
//! - [`PythonExecutor`]: runs code through an interpreter subprocess.

pub mod execute;
pub mod function;
pub mod handoff;
pub mod python;

pub use execute::ExecuteTool;
pub use function::{FunctionTool, ToolContext};
pub use handoff::{HandoffTarget, HandoffTool};
pub use python::PythonExecutor;

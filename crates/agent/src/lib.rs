//! The code-act agent: one turn of "think, write code, run it".
//!
//! Each step follows the same pipeline:
//!
//! 1. **Introspect** the tool set into Python-style stubs
//! 2. **Assemble** the system prompt and place it at the head of the input
//! 3. **Stream** the model reply, publishing every fragment
//! 4. **Extract** `<execute>` blocks from the full text
//! 5. **Synthesize** an `execute` tool selection (plus any native handoff call)
//! 6. **Record** the reply on the run's scratchpad
//!
//! Tool results come back through [`CodeActAgent::handle_tool_call_results`],
//! and [`CodeActAgent::finalize`] flushes the scratchpad to chat memory.
//! [`AgentRunner`] drives the whole cycle for a single user message.

pub mod code_act;
pub mod context;
pub mod extract;
pub mod introspect;
pub mod prompt;
pub mod runner;
pub mod scratchpad;
pub mod streamer;
pub mod synthesize;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use code_act::{
    AgentOutput, CodeActAgent, CodeActAgentBuilder, DEFAULT_AGENT_DESCRIPTION, DEFAULT_AGENT_NAME,
    DEFAULT_SCRATCHPAD_KEY,
};
pub use context::{RunContext, RunPhase};
pub use extract::extract_code;
pub use introspect::{describe, render_tool_descriptions, tool_signatures};
pub use prompt::{DEFAULT_CODE_ACT_PROMPT, PromptTemplate, TOOL_DESCRIPTIONS_PLACEHOLDER, install_system_message};
pub use runner::{AgentRunner, RunOutcome};
pub use scratchpad::Scratchpad;
pub use streamer::{StreamedResponse, stream_response};
pub use synthesize::{execute_selection, synthesize_tool_calls};

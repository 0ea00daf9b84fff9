//! Tool call synthesis: code becomes an `execute` selection.

use codeact_core::error::ProviderError;
use codeact_core::provider::{LanguageModel, StreamChunk};
use codeact_core::tool::{EXECUTE_TOOL_NAME, ToolSelection};
use uuid::Uuid;

/// An `execute` selection carrying `code`, under a fresh id.
pub fn execute_selection(code: &str) -> ToolSelection {
    let mut tool_kwargs = serde_json::Map::new();
    tool_kwargs.insert("code".into(), serde_json::Value::String(code.to_string()));
    ToolSelection {
        tool_id: Uuid::new_v4().to_string(),
        tool_name: EXECUTE_TOOL_NAME.into(),
        tool_kwargs,
    }
}

/// Build the step's tool selections.
///
/// The `execute` call (present only for a non-empty payload) comes first,
/// followed by whatever native calls a tool-calling model declared in the
/// final fragment.
pub fn synthesize_tool_calls(
    code: Option<&str>,
    model: &LanguageModel,
    last_chunk: &StreamChunk,
) -> Result<Vec<ToolSelection>, ProviderError> {
    let mut selections = Vec::new();
    if let Some(code) = code.filter(|c| !c.is_empty()) {
        selections.push(execute_selection(code));
    }

    if let Some(provider) = model.tool_calling() {
        selections.extend(provider.tool_calls_from_response(last_chunk, false)?);
    }

    Ok(selections)
}

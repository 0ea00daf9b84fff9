//! The `handoff` control tool.
//!
//! Handing off is decided natively by the model (it is the one tool a
//! code-act agent lets the model call directly). This tool only validates the
//! target and produces the message the next agent will see; switching agents
//! is up to the orchestrator.

use async_trait::async_trait;
use codeact_core::error::ToolError;
use codeact_core::tool::{HANDOFF_TOOL_NAME, Tool, ToolOutput};
use serde_json::Value;

/// An agent this agent may hand off to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffTarget {
    pub name: String,
    pub description: String,
}

impl HandoffTarget {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

pub struct HandoffTool {
    targets: Vec<HandoffTarget>,
    description: String,
}

impl HandoffTool {
    pub fn new(targets: Vec<HandoffTarget>) -> Self {
        let listing = targets
            .iter()
            .map(|t| format!("{}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n");
        let description = format!(
            "Hand off the conversation to another agent.\n\
             Use this when you are not equipped to handle the request, or another agent is better suited.\n\n\
             Currently available agents:\n{listing}"
        );
        Self { targets, description }
    }

    pub fn targets(&self) -> &[HandoffTarget] {
        &self.targets
    }
}

#[async_trait]
impl Tool for HandoffTool {
    fn name(&self) -> &str {
        HANDOFF_TOOL_NAME
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        let names: Vec<&str> = self.targets.iter().map(|t| t.name.as_str()).collect();
        serde_json::json!({
            "type": "object",
            "properties": {
                "to_agent": { "type": "string", "enum": names, "description": "The agent to hand off to" },
                "reason": { "type": "string", "description": "Why the handoff is needed" }
            },
            "required": ["to_agent", "reason"]
        })
    }

    async fn call(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let to_agent = arguments["to_agent"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'to_agent' argument".into()))?;
        let reason = arguments["reason"].as_str().unwrap_or("no reason given");

        if !self.targets.iter().any(|t| t.name == to_agent) {
            let valid = self
                .targets
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Ok(ToolOutput::error(format!(
                "Agent {to_agent} not found. Hand off to one of: {valid}"
            )));
        }

        let mut out = ToolOutput::text(format!(
            "Agent {to_agent} is now handling the request due to the following reason: {reason}.\n\
             Please continue with the current request."
        ));
        out.raw = Some(serde_json::json!({ "to_agent": to_agent, "reason": reason }));
        Ok(out)
    }
}

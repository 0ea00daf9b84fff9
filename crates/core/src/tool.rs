//! Tool trait: the abstraction over agent capabilities.
//!
//! A code-act agent does not call most tools natively. Instead, each tool
//! publishes a callable contract ([`FunctionSignature`]) that is rendered into
//! the system prompt, and the model calls it from inside generated code.
//! Only two tools are ever selected directly: the execution tool and the
//! handoff tool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::message::ContentBlock;
use crate::provider::ToolDefinition;

/// Name of the synthetic tool that runs extracted code.
pub const EXECUTE_TOOL_NAME: &str = "execute";

/// Name of the synthetic tool that transfers control to another agent.
pub const HANDOFF_TOOL_NAME: &str = "handoff";

/// One parameter of a callable contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    /// Type annotation as it should appear in the prompt (e.g. `int`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    /// Default value rendered as source text (e.g. `10`, `'celsius'`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: None,
            default: None,
        }
    }

    pub fn typed(name: impl Into<String>, annotation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: Some(annotation.into()),
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl std::fmt::Display for ParamSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)?;
        match (&self.annotation, &self.default) {
            (Some(ann), Some(def)) => write!(f, ": {ann} = {def}"),
            (Some(ann), None) => write!(f, ": {ann}"),
            (None, Some(def)) => write!(f, "={def}"),
            (None, None) => Ok(()),
        }
    }
}

/// The callable contract a tool exposes to generated code.
///
/// Computed once when the tool is constructed; `Display` renders the
/// declaration part, e.g. `add(a: int, b: int) -> int`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: None,
            doc: None,
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, annotation: impl Into<String>) -> Self {
        self.returns = Some(annotation.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

impl std::fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        f.write_str(")")?;
        if let Some(ret) = &self.returns {
            write!(f, " -> {ret}")?;
        }
        Ok(())
    }
}

/// A structured request to invoke a named tool.
///
/// Either synthesized locally (the execution call) or declared natively
/// by the model (handoff).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSelection {
    /// Correlation id
    pub tool_id: String,

    /// Name of the tool to execute
    pub tool_name: String,

    /// Argument name → value
    #[serde(default)]
    pub tool_kwargs: serde_json::Map<String, serde_json::Value>,
}

/// What a tool produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Textual content
    pub content: String,

    /// Structured content
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<ContentBlock>,

    /// Whether the tool reported a failure
    #[serde(default)]
    pub is_error: bool,

    /// Raw structured result from the underlying callable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            blocks: vec![ContentBlock::text(content.clone())],
            content,
            is_error: false,
            raw: None,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(content)
        }
    }
}

/// A tool result handed back to the agent, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_name: String,
    pub tool_id: String,
    #[serde(default)]
    pub tool_kwargs: serde_json::Map<String, serde_json::Value>,
    pub tool_output: ToolOutput,
}

impl ToolCallResult {
    /// Pair a selection with the output it produced.
    pub fn from_selection(selection: &ToolSelection, tool_output: ToolOutput) -> Self {
        Self {
            tool_name: selection.tool_name.clone(),
            tool_id: selection.tool_id.clone(),
            tool_kwargs: selection.tool_kwargs.clone(),
            tool_output,
        }
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// The callable contract, if this tool wraps a plain callable.
    ///
    /// `None` marks a tool that code-act agents cannot expose to code.
    fn signature(&self) -> Option<&FunctionSignature> {
        None
    }

    /// Whether calling this tool needs run context injected.
    fn requires_context(&self) -> bool {
        false
    }

    /// Invoke the tool with JSON arguments.
    async fn call(&self, arguments: serde_json::Value) -> std::result::Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Structured outcome of running a code payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Textual outcome (captured output, error text)
    pub content: String,

    /// Executor-specific detail (exit code, stderr, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

/// The external collaborator that actually runs generated code.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(&self, code: &str) -> std::result::Result<ExecutionResult, ToolError>;
}

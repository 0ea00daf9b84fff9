//! Tool introspection: turn the active tool set into prompt text.
//!
//! A code-act agent calls user tools from generated code, so each tool is
//! shown to the model as a Python-style stub. The control tools (`execute`,
//! `handoff`) are never rendered.

use std::sync::Arc;

use codeact_core::error::ConfigurationError;
use codeact_core::tool::{EXECUTE_TOOL_NAME, FunctionSignature, HANDOFF_TOOL_NAME, Tool};

fn is_control_tool(name: &str) -> bool {
    name == EXECUTE_TOOL_NAME || name == HANDOFF_TOOL_NAME
}

/// The callable contracts of every non-control tool, in tool order.
pub fn tool_signatures(tools: &[Arc<dyn Tool>]) -> Result<Vec<&FunctionSignature>, ConfigurationError> {
    let mut signatures = Vec::new();
    for tool in tools {
        if is_control_tool(tool.name()) {
            continue;
        }

        let Some(signature) = tool.signature() else {
            return Err(ConfigurationError::UnsupportedTool {
                tool_name: tool.name().to_string(),
            });
        };

        if tool.requires_context() {
            return Err(ConfigurationError::ToolRequiresContext {
                tool_name: tool.name().to_string(),
            });
        }

        signatures.push(signature);
    }
    Ok(signatures)
}

/// Render one stub: `def name(params) -> ret:`, the docstring, then `...`.
pub fn describe(signature: &FunctionSignature) -> String {
    let mut out = format!("def {signature}:");
    if let Some(doc) = signature.doc.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&format!("\n  \"\"\"\n{doc}\n  \"\"\"\n"));
    }
    out.push_str("\n  ...\n");
    out
}

/// Render all stubs, separated by blank lines.
pub fn render_tool_descriptions(tools: &[Arc<dyn Tool>]) -> Result<String, ConfigurationError> {
    Ok(tool_signatures(tools)?
        .into_iter()
        .map(describe)
        .collect::<Vec<_>>()
        .join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{NoopExecutor, add_tool};
    use codeact_core::error::ToolError;
    use codeact_core::tool::{ParamSpec, ToolOutput};
    use codeact_tools::{ExecuteTool, FunctionTool, HandoffTarget, HandoffTool};
    use serde_json::Value;

    struct Opaque;

    #[async_trait::async_trait]
    impl Tool for Opaque {
        fn name(&self) -> &str {
            "opaque"
        }
        fn description(&self) -> &str {
            "Not a function tool"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn call(&self, _arguments: Value) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text("ok"))
        }
    }

    #[test]
    fn renders_stub_with_docstring() {
        let rendered = render_tool_descriptions(&[add_tool()]).unwrap();
        assert_eq!(
            rendered,
            "def add(a: int, b: int) -> int:\n  \"\"\"\nAdd two numbers together.\n  \"\"\"\n\n  ...\n"
        );
    }

    #[test]
    fn renders_stub_without_docstring() {
        let sig = FunctionSignature::new("now");
        assert_eq!(describe(&sig), "def now():\n  ...\n");
    }

    #[test]
    fn stubs_are_blank_line_separated_in_order() {
        let greet: Arc<dyn Tool> = Arc::new(FunctionTool::new(
            FunctionSignature::new("greet").param(ParamSpec::new("name")),
            |_| async { Ok(ToolOutput::text("hi")) },
        ));
        let rendered = render_tool_descriptions(&[add_tool(), greet]).unwrap();
        let parts: Vec<&str> = rendered.split("\n\n\n").collect();
        assert!(parts[0].starts_with("def add("));
        assert!(rendered.ends_with("def greet(name):\n  ...\n"));
        assert!(rendered.contains("  ...\n\n\ndef greet"));
    }

    #[test]
    fn control_tools_are_skipped() {
        let tools: Vec<Arc<dyn Tool>> = vec![
            add_tool(),
            Arc::new(ExecuteTool::new(Arc::new(NoopExecutor))),
            Arc::new(HandoffTool::new(vec![HandoffTarget::new("writer", "Writes")])),
        ];
        let sigs = tool_signatures(&tools).unwrap();
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].name, "add");
    }

    #[test]
    fn context_tool_is_rejected() {
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(FunctionTool::with_context(
            FunctionSignature::new("whoami"),
            |_, _| async { Ok(ToolOutput::text("me")) },
        ))];
        assert_eq!(
            tool_signatures(&tools).unwrap_err(),
            ConfigurationError::ToolRequiresContext {
                tool_name: "whoami".into()
            }
        );
    }

    #[test]
    fn non_function_tool_is_rejected() {
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(Opaque)];
        let err = render_tool_descriptions(&tools).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnsupportedTool {
                tool_name: "opaque".into()
            }
        );
        assert!(err.to_string().contains("opaque"));
    }

    #[test]
    fn empty_tool_set_renders_nothing() {
        assert_eq!(render_tool_descriptions(&[]).unwrap(), "");
    }
}

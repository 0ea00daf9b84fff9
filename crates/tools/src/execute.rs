//! The `execute` control tool.

use std::sync::Arc;

use async_trait::async_trait;
use codeact_core::error::ToolError;
use codeact_core::message::ContentBlock;
use codeact_core::tool::{
    CodeExecutor, EXECUTE_TOOL_NAME, FunctionSignature, ParamSpec, Tool, ToolOutput,
};
use serde_json::Value;
use tracing::debug;

/// Adapts a [`CodeExecutor`] into the tool the agent selects when a
/// response contains code.
pub struct ExecuteTool {
    executor: Arc<dyn CodeExecutor>,
    signature: FunctionSignature,
}

impl ExecuteTool {
    pub fn new(executor: Arc<dyn CodeExecutor>) -> Self {
        let signature = FunctionSignature::new(EXECUTE_TOOL_NAME)
            .param(ParamSpec::typed("code", "str"))
            .returns("dict")
            .doc("Execute code and return its output.");
        Self { executor, signature }
    }
}

#[async_trait]
impl Tool for ExecuteTool {
    fn name(&self) -> &str {
        EXECUTE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Execute code and return its output."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": { "type": "string", "description": "The source code to run" }
            },
            "required": ["code"]
        })
    }

    fn signature(&self) -> Option<&FunctionSignature> {
        Some(&self.signature)
    }

    async fn call(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let code = arguments["code"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'code' argument".into()))?;

        debug!(bytes = code.len(), "Executing code payload");
        let result = self.executor.execute(code).await?;

        Ok(ToolOutput {
            blocks: vec![ContentBlock::text(result.content.clone())],
            content: result.content,
            is_error: false,
            raw: result.raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeact_core::tool::ExecutionResult;

    struct Upper;

    #[async_trait]
    impl CodeExecutor for Upper {
        async fn execute(&self, code: &str) -> Result<ExecutionResult, ToolError> {
            Ok(ExecutionResult {
                content: code.to_uppercase(),
                raw: Some(serde_json::json!({"exit_code": 0})),
            })
        }
    }

    #[tokio::test]
    async fn forwards_code_to_executor() {
        let tool = ExecuteTool::new(Arc::new(Upper));
        let out = tool.call(serde_json::json!({"code": "print(1)"})).await.unwrap();
        assert_eq!(out.content, "PRINT(1)");
        assert_eq!(out.raw.unwrap()["exit_code"], 0);
    }

    #[tokio::test]
    async fn missing_code_is_invalid() {
        let tool = ExecuteTool::new(Arc::new(Upper));
        let err = tool.call(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}

//! Shared test helpers for agent tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use codeact_core::error::{ProviderError, ToolError};
use codeact_core::message::{Message, MessageToolCall};
use codeact_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolCallingProvider,
};
use codeact_core::tool::{CodeExecutor, ExecutionResult, FunctionSignature, ParamSpec, Tool, ToolOutput};
use codeact_tools::FunctionTool;

type Script = Vec<Result<StreamChunk, ProviderError>>;

/// A provider that streams a sequence of scripted replies.
///
/// Each call to `stream` plays the next script and records the request.
/// Running out of scripts is reported as a provider error.
pub struct ScriptedModel {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedModel {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut rx = self.stream(request).await?;
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            text.push_str(chunk.delta());
            if chunk.done {
                tool_calls = chunk.tool_calls;
            }
        }
        let mut message = Message::assistant(text);
        message.tool_calls = tool_calls;
        Ok(ProviderResponse {
            message,
            usage: None,
            model: "scripted-model".into(),
            raw: serde_json::Value::Null,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured("script exhausted".into()))?;

        let (tx, rx) = tokio::sync::mpsc::channel(script.len().max(1));
        for item in script {
            // Capacity covers the whole script.
            let _ = tx.try_send(item);
        }
        Ok(rx)
    }
}

impl ToolCallingProvider for ScriptedModel {}

/// A reply split into text fragments; the last one is marked done.
pub fn text_chunks(parts: &[&str]) -> Script {
    let last = parts.len().saturating_sub(1);
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            Ok(StreamChunk {
                content: Some(part.to_string()),
                done: i == last,
                raw: serde_json::json!({ "index": i }),
                ..Default::default()
            })
        })
        .collect()
}

/// Like [`text_chunks`], with native tool calls on the final fragment.
pub fn chunks_with_tool_calls(parts: &[&str], tool_calls: Vec<MessageToolCall>) -> Script {
    let mut script = text_chunks(parts);
    if let Some(Ok(last)) = script.last_mut() {
        last.tool_calls = tool_calls;
    }
    script
}

pub fn handoff_call(id: &str, to_agent: &str, reason: &str) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: "handoff".into(),
        arguments: serde_json::json!({ "to_agent": to_agent, "reason": reason }).to_string(),
    }
}

/// `add(a: int, b: int) -> int`.
pub fn add_tool() -> Arc<dyn Tool> {
    let signature = FunctionSignature::new("add")
        .param(ParamSpec::typed("a", "int"))
        .param(ParamSpec::typed("b", "int"))
        .returns("int")
        .doc("Add two numbers together.");
    Arc::new(FunctionTool::new(signature, |args: serde_json::Value| async move {
        let a = args["a"].as_i64().unwrap_or_default();
        let b = args["b"].as_i64().unwrap_or_default();
        Ok(ToolOutput::text((a + b).to_string()))
    }))
}

/// An executor that is never expected to run.
pub struct NoopExecutor;

#[async_trait]
impl CodeExecutor for NoopExecutor {
    async fn execute(&self, _code: &str) -> Result<ExecutionResult, ToolError> {
        Ok(ExecutionResult::default())
    }
}

/// An executor that echoes the code back as its output.
pub struct EchoExecutor;

#[async_trait]
impl CodeExecutor for EchoExecutor {
    async fn execute(&self, code: &str) -> Result<ExecutionResult, ToolError> {
        Ok(ExecutionResult {
            content: format!("ran: {code}"),
            raw: None,
        })
    }
}

//! Provider traits: the abstraction over LLM backends.
//!
//! A [`Provider`] sends a conversation to a model and yields either a complete
//! message or a stream of fragments. A [`ToolCallingProvider`] additionally
//! understands native tool definitions and can decode the tool calls a model
//! declared. [`LanguageModel`] holds one or the other so callers pick a code
//! path by capability, checked once when an agent is built.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, MessageToolCall};
use crate::tool::ToolSelection;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Tools the model may call natively
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Raw provider payload
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Token usage information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single fragment of a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Native tool calls accumulated so far (complete on the final chunk)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// The provider payload this fragment was decoded from
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl StreamChunk {
    /// The textual delta carried by this fragment, or `""`.
    pub fn delta(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Receiving half of a fragment stream.
pub type ChunkReceiver = tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>;

/// The core Provider trait.
///
/// Every LLM backend implements this trait. The step loop calls `stream()`
/// without knowing which provider is being used.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// Default implementation calls `complete()` and wraps the result as a single chunk.
    async fn stream(&self, request: ProviderRequest) -> std::result::Result<ChunkReceiver, ProviderError> {
        let response = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx
            .send(Ok(StreamChunk {
                content: Some(response.message.content),
                tool_calls: response.message.tool_calls,
                done: true,
                usage: response.usage,
                raw: response.raw,
            }))
            .await;
        Ok(rx)
    }
}

/// A provider that supports native tool calling.
///
/// Tool definitions travel in [`ProviderRequest::tools`]; this trait adds the
/// decoding side.
pub trait ToolCallingProvider: Provider {
    /// Decode the tool calls the model declared in a (final) fragment.
    ///
    /// With `error_on_no_tool_call == false`, absence yields an empty list.
    fn tool_calls_from_response(
        &self,
        chunk: &StreamChunk,
        error_on_no_tool_call: bool,
    ) -> std::result::Result<Vec<ToolSelection>, ProviderError> {
        if chunk.tool_calls.is_empty() {
            if error_on_no_tool_call {
                return Err(ProviderError::MalformedToolCall(
                    "expected at least one tool call in response".into(),
                ));
            }
            return Ok(Vec::new());
        }

        chunk
            .tool_calls
            .iter()
            .map(|tc| {
                let tool_kwargs = if tc.arguments.trim().is_empty() {
                    serde_json::Map::new()
                } else {
                    match serde_json::from_str::<serde_json::Value>(&tc.arguments) {
                        Ok(serde_json::Value::Object(map)) => map,
                        Ok(other) => {
                            return Err(ProviderError::MalformedToolCall(format!(
                                "arguments for '{}' are not an object: {other}",
                                tc.name
                            )));
                        }
                        Err(e) => {
                            return Err(ProviderError::MalformedToolCall(format!(
                                "arguments for '{}' are not valid JSON: {e}",
                                tc.name
                            )));
                        }
                    }
                };
                Ok(ToolSelection {
                    tool_id: tc.id.clone(),
                    tool_name: tc.name.clone(),
                    tool_kwargs,
                })
            })
            .collect()
    }
}

/// The language-model dependency of an agent, by capability.
#[derive(Clone)]
pub enum LanguageModel {
    /// Plain streaming chat.
    Chat(Arc<dyn Provider>),
    /// Streaming chat plus native tool calling.
    ToolCalling(Arc<dyn ToolCallingProvider>),
}

impl LanguageModel {
    pub fn provider(&self) -> &dyn Provider {
        match self {
            Self::Chat(p) => p.as_ref(),
            Self::ToolCalling(p) => p.as_ref(),
        }
    }

    pub fn tool_calling(&self) -> Option<&dyn ToolCallingProvider> {
        match self {
            Self::Chat(_) => None,
            Self::ToolCalling(p) => Some(p.as_ref()),
        }
    }

    pub fn supports_tool_calling(&self) -> bool {
        matches!(self, Self::ToolCalling(_))
    }

    pub fn name(&self) -> &str {
        self.provider().name()
    }
}

impl std::fmt::Debug for LanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat(p) => f.debug_tuple("Chat").field(&p.name()).finish(),
            Self::ToolCalling(p) => f.debug_tuple("ToolCalling").field(&p.name()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Provider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ProviderResponse {
                message: Message::assistant(last),
                usage: None,
                model: request.model,
                raw: serde_json::json!({"echo": true}),
            })
        }
    }

    impl ToolCallingProvider for Echo {}

    fn request(text: &str) -> ProviderRequest {
        ProviderRequest {
            model: "echo-1".into(),
            messages: vec![Message::user(text)],
            temperature: default_temperature(),
            max_tokens: None,
            tools: vec![],
            stream: true,
        }
    }

    #[tokio::test]
    async fn default_stream_wraps_completion() {
        let mut rx = Echo.stream(request("hi")).await.unwrap();
        let chunk = rx.recv().await.unwrap().unwrap();
        assert_eq!(chunk.delta(), "hi");
        assert!(chunk.done);
        assert_eq!(chunk.raw["echo"], true);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn decode_tool_calls_tolerates_absence() {
        let chunk = StreamChunk::default();
        assert!(Echo.tool_calls_from_response(&chunk, false).unwrap().is_empty());
        assert!(Echo.tool_calls_from_response(&chunk, true).is_err());
    }

    #[test]
    fn decode_tool_calls_parses_arguments() {
        let chunk = StreamChunk {
            tool_calls: vec![MessageToolCall {
                id: "call_1".into(),
                name: "handoff".into(),
                arguments: r#"{"to_agent":"writer","reason":"needs prose"}"#.into(),
            }],
            done: true,
            ..Default::default()
        };
        let calls = Echo.tool_calls_from_response(&chunk, false).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "handoff");
        assert_eq!(calls[0].tool_kwargs["to_agent"], "writer");
    }

    #[test]
    fn decode_tool_calls_rejects_non_object_arguments() {
        let chunk = StreamChunk {
            tool_calls: vec![MessageToolCall {
                id: "call_1".into(),
                name: "handoff".into(),
                arguments: "[1, 2]".into(),
            }],
            ..Default::default()
        };
        let err = Echo.tool_calls_from_response(&chunk, false).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedToolCall(_)));
    }

    #[test]
    fn language_model_reports_capability() {
        let chat = LanguageModel::Chat(Arc::new(Echo));
        let tc = LanguageModel::ToolCalling(Arc::new(Echo));
        assert!(!chat.supports_tool_calling());
        assert!(chat.tool_calling().is_none());
        assert!(tc.supports_tool_calling());
        assert_eq!(tc.name(), "echo");
    }
}

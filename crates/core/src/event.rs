//! Agent event stream: observability for each step.
//!
//! Events are published while a step runs: the assembled input, every
//! streamed delta, the step output, and each tool result. Subscribers
//! (a CLI printer, a UI, a trace recorder) react without coupling to the loop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::message::Message;
use crate::tool::{ToolOutput, ToolSelection};

/// All events emitted by an agent step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The finalized model input for a step.
    AgentInput {
        input: Vec<Message>,
        current_agent_name: String,
    },

    /// One streamed fragment.
    AgentStream {
        delta: String,
        response: String,
        #[serde(default)]
        tool_calls: Vec<ToolSelection>,
        #[serde(default)]
        raw: serde_json::Value,
        current_agent_name: String,
    },

    /// The output of a completed step.
    AgentOutput {
        response: Message,
        #[serde(default)]
        tool_calls: Vec<ToolSelection>,
        #[serde(default)]
        raw: serde_json::Value,
        current_agent_name: String,
    },

    /// A tool finished and its result is about to be handed back.
    ToolCallResult {
        tool_name: String,
        tool_id: String,
        #[serde(default)]
        tool_kwargs: serde_json::Map<String, serde_json::Value>,
        tool_output: ToolOutput,
    },
}

impl AgentEvent {
    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AgentInput { .. } => "agent_input",
            Self::AgentStream { .. } => "agent_stream",
            Self::AgentOutput { .. } => "agent_output",
            Self::ToolCallResult { .. } => "tool_call_result",
        }
    }
}

/// A broadcast-based event bus for agent events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Publishing
/// never blocks the step; slow subscribers lag instead.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

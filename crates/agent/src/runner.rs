//! Multi-round driver for a code-act agent.
//!
//! The agent itself only steps; the runner plays the part of the workflow
//! engine around it: it executes the selected tools, feeds their results
//! back, and finalizes when the model stops asking for tools.

use std::sync::Arc;

use codeact_core::error::Result;
use codeact_core::event::{AgentEvent, EventBus};
use codeact_core::memory::ChatMemory;
use codeact_core::message::Message;
use codeact_core::store::{RunId, ScratchpadStore};
use codeact_core::tool::{HANDOFF_TOOL_NAME, ToolCallResult, ToolOutput, ToolSelection};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::code_act::{AgentOutput, CodeActAgent};
use crate::context::RunContext;

/// How a run ended.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// The last step's assistant message.
    pub response: Message,
    /// Number of steps taken.
    pub iterations: u32,
    /// Number of tool calls executed across all steps.
    pub tool_calls_made: usize,
    /// Target agent, if the run ended in a handoff.
    pub handoff_to: Option<String>,
    pub run_id: RunId,
}

pub struct AgentRunner {
    agent: Arc<CodeActAgent>,
    memory: Arc<dyn ChatMemory>,
    scratchpads: Arc<dyn ScratchpadStore>,
    events: Arc<EventBus>,
    max_iterations: u32,
}

impl AgentRunner {
    pub fn new(agent: Arc<CodeActAgent>, memory: Arc<dyn ChatMemory>, scratchpads: Arc<dyn ScratchpadStore>) -> Self {
        Self {
            agent,
            memory,
            scratchpads,
            events: Arc::new(EventBus::default()),
            max_iterations: 10,
        }
    }

    /// Publish events on a shared bus.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Set the maximum number of steps per run.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn agent(&self) -> &CodeActAgent {
        &self.agent
    }

    /// Run the agent on one user message.
    ///
    /// The message goes into chat memory first so it is part of the
    /// history; the run's own turns reach memory only at finalize.
    pub async fn run(&self, input: &str) -> Result<RunOutcome> {
        let ctx = RunContext::new(self.scratchpads.clone(), self.events.clone());
        info!(agent = %self.agent.name(), run_id = %ctx.run_id(), "Starting run");

        let outcome = self.drive(&ctx, input).await;

        if let Err(e) = self.scratchpads.remove_run(ctx.run_id()).await {
            warn!(run_id = %ctx.run_id(), "Failed to drop run scratchpads: {e}");
        }
        outcome
    }

    async fn drive(&self, ctx: &RunContext, input: &str) -> Result<RunOutcome> {
        let user = Message::user(input);
        self.memory.put(user.clone()).await?;
        let mut history = self.memory.get_all().await?;
        if !history.iter().any(|m| m.id == user.id) {
            history.push(user);
        }

        let mut iterations = 0;
        let mut tool_calls_made = 0;
        let mut handoff_to = None;

        let output: AgentOutput = loop {
            iterations += 1;
            let output = self.agent.take_step(ctx, &history, self.agent.tools()).await?;

            if output.tool_calls.is_empty() {
                debug!(iteration = iterations, "No tool calls, run complete");
                break output;
            }

            let mut results = Vec::with_capacity(output.tool_calls.len());
            for selection in &output.tool_calls {
                let tool_output = self.call_tool(selection).await;
                tool_calls_made += 1;

                if selection.tool_name == HANDOFF_TOOL_NAME && !tool_output.is_error {
                    handoff_to = selection
                        .tool_kwargs
                        .get("to_agent")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }

                self.events.publish(AgentEvent::ToolCallResult {
                    tool_name: selection.tool_name.clone(),
                    tool_id: selection.tool_id.clone(),
                    tool_kwargs: selection.tool_kwargs.clone(),
                    tool_output: tool_output.clone(),
                });
                results.push(ToolCallResult::from_selection(selection, tool_output));
            }

            self.agent.handle_tool_call_results(ctx, &results).await?;

            if let Some(target) = &handoff_to {
                info!(from = %self.agent.name(), to = %target, "Handing off");
                break output;
            }
            if iterations >= self.max_iterations {
                warn!(max = self.max_iterations, "Max iterations reached");
                break output;
            }
        };

        let output = self.agent.finalize(ctx, output, self.memory.as_ref()).await?;
        info!(
            agent = %self.agent.name(),
            run_id = %ctx.run_id(),
            iterations,
            tool_calls_made,
            "Run complete"
        );

        Ok(RunOutcome {
            response: output.response,
            iterations,
            tool_calls_made,
            handoff_to,
            run_id: ctx.run_id().clone(),
        })
    }

    async fn call_tool(&self, selection: &ToolSelection) -> ToolOutput {
        let Some(tool) = self.agent.tool(&selection.tool_name) else {
            warn!(tool = %selection.tool_name, "Model selected an unknown tool");
            return ToolOutput::error(format!("Error: tool '{}' not found", selection.tool_name));
        };

        debug!(tool = %selection.tool_name, tool_id = %selection.tool_id, "Executing tool");
        match tool.call(Value::Object(selection.tool_kwargs.clone())).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %selection.tool_name, "Tool failed: {e}");
                ToolOutput::error(format!("Error: {e}"))
            }
        }
    }
}

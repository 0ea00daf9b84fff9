//! The code-act agent.
//!
//! Each step renders the tool stubs into the system prompt, streams one model
//! reply, pulls `<execute>` blocks out of it, and turns them into an
//! `execute` selection. The reply is kept on a run-scoped scratchpad along
//! with tool results; [`CodeActAgent::finalize`] moves the scratchpad into
//! chat memory.

use std::sync::Arc;

use codeact_core::error::{ConfigurationError, ProtocolError, Result};
use codeact_core::event::AgentEvent;
use codeact_core::memory::ChatMemory;
use codeact_core::message::{Message, MessageToolCall};
use codeact_core::provider::{LanguageModel, ProviderRequest};
use codeact_core::tool::{
    CodeExecutor, EXECUTE_TOOL_NAME, HANDOFF_TOOL_NAME, Tool, ToolCallResult, ToolSelection,
};
use codeact_tools::{ExecuteTool, HandoffTarget, HandoffTool};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::{RunContext, RunPhase};
use crate::extract::extract_code;
use crate::introspect::render_tool_descriptions;
use crate::prompt::{DEFAULT_CODE_ACT_PROMPT, PromptTemplate, install_system_message};
use crate::streamer::stream_response;
use crate::synthesize::synthesize_tool_calls;

pub const DEFAULT_AGENT_NAME: &str = "code_act_agent";
pub const DEFAULT_AGENT_DESCRIPTION: &str = "A workflow agent that can execute code.";
pub const DEFAULT_SCRATCHPAD_KEY: &str = "scratchpad";

/// The result of one step.
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutput {
    /// The assistant message holding the full reply text.
    pub response: Message,
    /// `execute` first, then any native calls.
    pub tool_calls: Vec<ToolSelection>,
    /// Raw payload of the last fragment.
    pub raw: Value,
    pub current_agent_name: String,
}

pub struct CodeActAgent {
    name: String,
    description: String,
    prompt: PromptTemplate,
    tools: Vec<Arc<dyn Tool>>,
    model: LanguageModel,
    model_id: String,
    temperature: f32,
    max_tokens: Option<u32>,
    scratchpad_key: String,
}

impl CodeActAgent {
    pub fn builder(model: LanguageModel, model_id: impl Into<String>) -> CodeActAgentBuilder {
        CodeActAgentBuilder::new(model, model_id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The agent's tool set, including `execute` and (if configured) `handoff`.
    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn model(&self) -> &LanguageModel {
        &self.model
    }

    pub fn scratchpad_key(&self) -> &str {
        &self.scratchpad_key
    }

    /// The system prompt for the given tool set.
    pub fn system_prompt(&self, tools: &[Arc<dyn Tool>]) -> Result<String> {
        let descriptions = render_tool_descriptions(tools)?;
        Ok(self.prompt.format(&descriptions))
    }

    /// Run one step: prompt, stream, extract, synthesize, record.
    ///
    /// `llm_input` is the conversation history; the run's scratchpad is
    /// appended after it. The scratchpad is written once, after the reply
    /// is complete, so a failed or cancelled step leaves it untouched.
    pub async fn take_step(
        &self,
        ctx: &RunContext,
        llm_input: &[Message],
        tools: &[Arc<dyn Tool>],
    ) -> Result<AgentOutput> {
        let guard = ctx.begin_step()?;
        let scratchpad = ctx.scratchpad(&self.scratchpad_key);
        let mut pad = scratchpad.read().await?;

        let mut input: Vec<Message> = llm_input.iter().cloned().chain(pad.iter().cloned()).collect();
        let system_prompt = self.system_prompt(tools)?;
        install_system_message(&mut input, &system_prompt);

        info!(
            agent = %self.name,
            run_id = %ctx.run_id(),
            history = llm_input.len(),
            scratchpad = pad.len(),
            "Taking step"
        );
        ctx.events().publish(AgentEvent::AgentInput {
            input: input.clone(),
            current_agent_name: self.name.clone(),
        });

        let request = ProviderRequest {
            model: self.model_id.clone(),
            messages: input,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: Vec::new(),
            stream: true,
        };
        let streamed = stream_response(&self.model, request, tools, ctx.events(), &self.name).await?;

        let code = extract_code(&streamed.text);
        let tool_calls = synthesize_tool_calls(code.as_deref(), &self.model, &streamed.last_chunk)?;
        debug!(
            agent = %self.name,
            has_code = code.as_deref().is_some_and(|c| !c.is_empty()),
            tool_calls = tool_calls.len(),
            "Synthesized tool calls"
        );

        let mut response = Message::assistant(streamed.text);
        response.tool_calls = tool_calls
            .iter()
            .filter(|tc| tc.tool_name != EXECUTE_TOOL_NAME)
            .map(|tc| MessageToolCall {
                id: tc.tool_id.clone(),
                name: tc.tool_name.clone(),
                arguments: Value::Object(tc.tool_kwargs.clone()).to_string(),
            })
            .collect();

        pad.push(response.clone());
        scratchpad.replace(pad).await?;
        guard.commit(RunPhase::AwaitingToolResults);

        let output = AgentOutput {
            response,
            tool_calls,
            raw: streamed.last_chunk.raw,
            current_agent_name: self.name.clone(),
        };
        ctx.events().publish(AgentEvent::AgentOutput {
            response: output.response.clone(),
            tool_calls: output.tool_calls.clone(),
            raw: output.raw.clone(),
            current_agent_name: self.name.clone(),
        });
        Ok(output)
    }

    /// Record tool results on the scratchpad.
    ///
    /// `execute` results become user messages, `handoff` results become
    /// tool messages tied to their call id. Any other tool name is a
    /// protocol error and nothing is written.
    pub async fn handle_tool_call_results(&self, ctx: &RunContext, results: &[ToolCallResult]) -> Result<()> {
        let guard = ctx.begin_tool_results()?;

        let entries = results
            .iter()
            .map(translate_result)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let scratchpad = ctx.scratchpad(&self.scratchpad_key);
        let pad = scratchpad.extend(entries).await?;
        guard.commit(RunPhase::AwaitingToolResults);

        debug!(
            agent = %self.name,
            run_id = %ctx.run_id(),
            results = results.len(),
            scratchpad = pad.len(),
            "Recorded tool results"
        );
        Ok(())
    }

    /// Flush the scratchpad into `memory`, then clear it.
    ///
    /// Runs once per run. If the memory write fails the scratchpad is kept
    /// and the run can be finalized again. Once the write succeeds the run
    /// is finalized; a failed clear is logged and the stale slot is left for
    /// the store's `remove_run`.
    pub async fn finalize(&self, ctx: &RunContext, output: AgentOutput, memory: &dyn ChatMemory) -> Result<AgentOutput> {
        let guard = ctx.begin_finalize()?;
        let scratchpad = ctx.scratchpad(&self.scratchpad_key);
        let pad = scratchpad.read().await?;
        let count = pad.len();

        memory.put_messages(pad).await?;
        guard.commit(RunPhase::Finalized);

        if let Err(e) = scratchpad.clear().await {
            warn!(agent = %self.name, run_id = %ctx.run_id(), "Failed to clear flushed scratchpad: {e}");
        }

        info!(agent = %self.name, run_id = %ctx.run_id(), messages = count, memory = memory.name(), "Run finalized");
        Ok(output)
    }
}

fn translate_result(result: &ToolCallResult) -> std::result::Result<Message, ProtocolError> {
    match result.tool_name.as_str() {
        EXECUTE_TOOL_NAME => Ok(Message::user(format!(
            "Result of executing the code given:\n\n{}",
            result.tool_output.content
        ))),
        HANDOFF_TOOL_NAME => Ok(Message::tool_blocks(
            result.tool_id.clone(),
            result.tool_output.blocks.clone(),
        )),
        other => {
            warn!(tool = %other, tool_id = %result.tool_id, "Tool result for unknown tool");
            Err(ProtocolError::UnknownToolResult {
                tool_name: other.to_string(),
                tool_id: result.tool_id.clone(),
            })
        }
    }
}

impl std::fmt::Debug for CodeActAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeActAgent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("model_id", &self.model_id)
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("scratchpad_key", &self.scratchpad_key)
            .finish()
    }
}

/// Builder for [`CodeActAgent`].
pub struct CodeActAgentBuilder {
    name: String,
    description: String,
    system_prompt: Option<String>,
    code_act_prompt: String,
    tools: Vec<Arc<dyn Tool>>,
    can_handoff_to: Vec<HandoffTarget>,
    model: LanguageModel,
    model_id: String,
    temperature: f32,
    max_tokens: Option<u32>,
    scratchpad_key: String,
    executor: Option<Arc<dyn CodeExecutor>>,
}

impl CodeActAgentBuilder {
    pub fn new(model: LanguageModel, model_id: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.into(),
            description: DEFAULT_AGENT_DESCRIPTION.into(),
            system_prompt: None,
            code_act_prompt: DEFAULT_CODE_ACT_PROMPT.into(),
            tools: Vec::new(),
            can_handoff_to: Vec::new(),
            model,
            model_id: model_id.into(),
            temperature: 0.7,
            max_tokens: None,
            scratchpad_key: DEFAULT_SCRATCHPAD_KEY.into(),
            executor: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Extra instructions appended after the code-act prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Replace the code-act prompt template.
    pub fn with_code_act_prompt(mut self, template: impl Into<String>) -> Self {
        self.code_act_prompt = template.into();
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn with_handoff_targets(mut self, targets: Vec<HandoffTarget>) -> Self {
        self.can_handoff_to = targets;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_scratchpad_key(mut self, key: impl Into<String>) -> Self {
        self.scratchpad_key = key.into();
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn CodeExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> std::result::Result<CodeActAgent, ConfigurationError> {
        let executor = self.executor.ok_or(ConfigurationError::MissingExecutor)?;
        let prompt = PromptTemplate::new(self.code_act_prompt, self.system_prompt.as_deref())?;

        let mut tools = self.tools;
        render_tool_descriptions(&tools)?;
        tools.push(Arc::new(ExecuteTool::new(executor)));

        if !self.can_handoff_to.is_empty() {
            if !self.model.supports_tool_calling() {
                return Err(ConfigurationError::ToolCallingUnsupported {
                    provider: self.model.name().to_string(),
                });
            }
            tools.push(Arc::new(HandoffTool::new(self.can_handoff_to)));
        }

        debug!(
            agent = %self.name,
            tools = tools.len(),
            model = %self.model_id,
            "Code-act agent built"
        );

        Ok(CodeActAgent {
            name: self.name,
            description: self.description,
            prompt,
            tools,
            model: self.model,
            model_id: self.model_id,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            scratchpad_key: self.scratchpad_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        EchoExecutor, NoopExecutor, ScriptedModel, add_tool, chunks_with_tool_calls, handoff_call, text_chunks,
    };
    use async_trait::async_trait;
    use codeact_core::error::{Error, MemoryError};
    use codeact_core::event::EventBus;
    use codeact_core::message::Role;
    use codeact_core::store::{RunId, ScratchpadStore};
    use codeact_core::tool::ToolOutput;
    use codeact_memory::{InMemoryChatMemory, InMemoryScratchpadStore};

    fn agent(scripted: Arc<ScriptedModel>) -> CodeActAgent {
        CodeActAgent::builder(LanguageModel::Chat(scripted), "mock-model")
            .with_tool(add_tool())
            .with_executor(Arc::new(NoopExecutor))
            .build()
            .unwrap()
    }

    fn handoff_agent(scripted: Arc<ScriptedModel>) -> CodeActAgent {
        CodeActAgent::builder(LanguageModel::ToolCalling(scripted), "mock-model")
            .with_name("coder")
            .with_tool(add_tool())
            .with_executor(Arc::new(EchoExecutor))
            .with_handoff_targets(vec![HandoffTarget::new("writer", "Writes prose")])
            .build()
            .unwrap()
    }

    fn ctx() -> (RunContext, Arc<InMemoryScratchpadStore>) {
        let store = Arc::new(InMemoryScratchpadStore::new());
        let ctx = RunContext::with_run_id(RunId::from("run-1"), store.clone(), Arc::new(EventBus::default()));
        (ctx, store)
    }

    fn execute_result(tool_id: &str, content: &str) -> ToolCallResult {
        ToolCallResult {
            tool_name: "execute".into(),
            tool_id: tool_id.into(),
            tool_kwargs: serde_json::Map::new(),
            tool_output: ToolOutput::text(content),
        }
    }

    struct BrokenMemory;

    #[async_trait]
    impl ChatMemory for BrokenMemory {
        fn name(&self) -> &str {
            "broken"
        }
        async fn put_messages(&self, _messages: Vec<Message>) -> std::result::Result<(), MemoryError> {
            Err(MemoryError::Storage("disk full".into()))
        }
        async fn get_all(&self) -> std::result::Result<Vec<Message>, MemoryError> {
            Ok(vec![])
        }
        async fn clear(&self) -> std::result::Result<(), MemoryError> {
            Ok(())
        }
    }

    #[test]
    fn build_requires_executor() {
        let model = LanguageModel::Chat(Arc::new(ScriptedModel::new(vec![])));
        let err = CodeActAgent::builder(model, "m").build().unwrap_err();
        assert_eq!(err, ConfigurationError::MissingExecutor);
    }

    #[test]
    fn build_rejects_handoff_on_plain_chat_model() {
        let model = LanguageModel::Chat(Arc::new(ScriptedModel::new(vec![])));
        let err = CodeActAgent::builder(model, "m")
            .with_executor(Arc::new(NoopExecutor))
            .with_handoff_targets(vec![HandoffTarget::new("writer", "Writes prose")])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::ToolCallingUnsupported {
                provider: "scripted".into()
            }
        );
    }

    #[test]
    fn build_rejects_template_without_placeholder() {
        let model = LanguageModel::Chat(Arc::new(ScriptedModel::new(vec![])));
        let err = CodeActAgent::builder(model, "m")
            .with_executor(Arc::new(NoopExecutor))
            .with_code_act_prompt("no tools here")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidTemplate { .. }));
    }

    #[test]
    fn build_appends_control_tools() {
        let agent = handoff_agent(Arc::new(ScriptedModel::new(vec![])));
        let names: Vec<&str> = agent.tools().iter().map(|t| t.name()).collect();
        assert_eq!(names, ["add", "execute", "handoff"]);
        assert_eq!(agent.name(), "coder");
        assert_eq!(agent.scratchpad_key(), DEFAULT_SCRATCHPAD_KEY);
    }

    #[test]
    fn system_prompt_lists_user_tools_only() {
        let agent = handoff_agent(Arc::new(ScriptedModel::new(vec![])));
        let prompt = agent.system_prompt(agent.tools()).unwrap();
        assert!(prompt.contains("def add(a: int, b: int) -> int:"));
        assert!(!prompt.contains("def execute"));
        assert!(!prompt.contains("def handoff"));
        assert!(!prompt.contains(crate::prompt::TOOL_DESCRIPTIONS_PLACEHOLDER));
    }

    #[tokio::test]
    async fn step_synthesizes_execute_call_from_code_block() {
        let scripted = Arc::new(ScriptedModel::new(vec![text_chunks(&[
            "Sure.\n",
            "<execute>\nprint(1+1)\n</execute>",
        ])]));
        let agent = agent(scripted.clone());
        let (ctx, _) = ctx();

        let out = agent.take_step(&ctx, &[], agent.tools()).await.unwrap();

        assert_eq!(out.tool_calls.len(), 1);
        assert_eq!(out.tool_calls[0].tool_name, "execute");
        assert_eq!(out.tool_calls[0].tool_kwargs["code"], "print(1+1)");
        assert_eq!(out.response.content, "Sure.\n<execute>\nprint(1+1)\n</execute>");
        assert!(out.response.tool_calls.is_empty());
        assert_eq!(out.raw["index"], 1);
        assert_eq!(out.current_agent_name, DEFAULT_AGENT_NAME);

        let pad = ctx.scratchpad(DEFAULT_SCRATCHPAD_KEY).read().await.unwrap();
        assert_eq!(pad, vec![out.response.clone()]);
        assert_eq!(ctx.phase(), RunPhase::AwaitingToolResults);

        let sent = scripted.requests();
        assert_eq!(sent[0].messages.len(), 1);
        assert_eq!(sent[0].messages[0].role, Role::System);
        assert!(sent[0].messages[0].content.contains("def add("));
    }

    #[tokio::test]
    async fn plain_text_turn_has_no_tool_calls() {
        let scripted = Arc::new(ScriptedModel::new(vec![text_chunks(&["The answer ", "is 4."])]));
        let agent = agent(scripted);
        let (ctx, _) = ctx();

        let out = agent
            .take_step(&ctx, &[Message::user("what is 2+2?")], agent.tools())
            .await
            .unwrap();
        assert!(out.tool_calls.is_empty());
        assert_eq!(out.response.content, "The answer is 4.");
        assert_eq!(out.response.role, Role::Assistant);
    }

    #[tokio::test]
    async fn multiple_blocks_join_into_one_call() {
        let scripted = Arc::new(ScriptedModel::new(vec![text_chunks(&[
            "<execute>a = 1</execute> then <execute>\nprint(a)\n</execute>",
        ])]));
        let agent = agent(scripted);
        let (ctx, _) = ctx();

        let out = agent.take_step(&ctx, &[], agent.tools()).await.unwrap();
        assert_eq!(out.tool_calls.len(), 1);
        assert_eq!(out.tool_calls[0].tool_kwargs["code"], "a = 1\n\nprint(a)");
    }

    #[tokio::test]
    async fn execute_result_becomes_user_message() {
        let scripted = Arc::new(ScriptedModel::new(vec![text_chunks(&["<execute>print(1+1)</execute>"])]));
        let agent = agent(scripted);
        let (ctx, _) = ctx();
        let out = agent.take_step(&ctx, &[], agent.tools()).await.unwrap();

        agent
            .handle_tool_call_results(&ctx, &[execute_result(&out.tool_calls[0].tool_id, "2")])
            .await
            .unwrap();

        let pad = ctx.scratchpad(DEFAULT_SCRATCHPAD_KEY).read().await.unwrap();
        assert_eq!(pad.len(), 2);
        assert_eq!(pad[1].role, Role::User);
        assert_eq!(pad[1].content, "Result of executing the code given:\n\n2");
    }

    #[tokio::test]
    async fn unknown_tool_result_is_protocol_error_and_leaves_scratchpad() {
        let scripted = Arc::new(ScriptedModel::new(vec![text_chunks(&["<execute>x</execute>"])]));
        let agent = agent(scripted);
        let (ctx, _) = ctx();
        agent.take_step(&ctx, &[], agent.tools()).await.unwrap();
        let before = ctx.scratchpad(DEFAULT_SCRATCHPAD_KEY).read().await.unwrap();

        let mut stray = execute_result("call_9", "results");
        stray.tool_name = "search".into();
        let err = agent
            .handle_tool_call_results(&ctx, &[execute_result("call_1", "ok"), stray])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::UnknownToolResult { ref tool_name, .. }) if tool_name == "search"
        ));
        assert!(err.is_fatal());
        assert_eq!(ctx.scratchpad(DEFAULT_SCRATCHPAD_KEY).read().await.unwrap(), before);
        assert_eq!(ctx.phase(), RunPhase::AwaitingToolResults);
    }

    #[tokio::test]
    async fn tool_results_before_any_step_are_rejected() {
        let agent = agent(Arc::new(ScriptedModel::new(vec![])));
        let (ctx, _) = ctx();
        let err = agent
            .handle_tool_call_results(&ctx, &[execute_result("call_1", "2")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::UnexpectedToolResults { .. })));
    }

    #[tokio::test]
    async fn handoff_call_is_recorded_and_answered_with_tool_message() {
        let scripted = Arc::new(ScriptedModel::new(vec![chunks_with_tool_calls(
            &["Passing this on."],
            vec![handoff_call("call_h", "writer", "needs prose")],
        )]));
        let agent = handoff_agent(scripted.clone());
        let (ctx, _) = ctx();

        let out = agent.take_step(&ctx, &[Message::user("write a poem")], agent.tools()).await.unwrap();
        assert_eq!(out.tool_calls.len(), 1);
        assert_eq!(out.tool_calls[0].tool_name, "handoff");
        assert_eq!(out.tool_calls[0].tool_kwargs["to_agent"], "writer");
        assert_eq!(out.response.tool_calls.len(), 1);
        assert_eq!(out.response.tool_calls[0].id, "call_h");
        assert_eq!(scripted.requests()[0].tools[0].name, "handoff");

        let handoff = agent.tool(HANDOFF_TOOL_NAME).unwrap();
        let output = handoff
            .call(serde_json::Value::Object(out.tool_calls[0].tool_kwargs.clone()))
            .await
            .unwrap();
        let result = ToolCallResult::from_selection(&out.tool_calls[0], output.clone());
        agent.handle_tool_call_results(&ctx, &[result]).await.unwrap();

        let pad = ctx.scratchpad(DEFAULT_SCRATCHPAD_KEY).read().await.unwrap();
        assert_eq!(pad[1].role, Role::Tool);
        assert_eq!(pad[1].tool_call_id.as_deref(), Some("call_h"));
        assert_eq!(pad[1].blocks, output.blocks);
    }

    #[tokio::test]
    async fn second_step_sees_scratchpad_after_history_with_one_system_message() {
        let scripted = Arc::new(ScriptedModel::new(vec![
            text_chunks(&["<execute>print(2)</execute>"]),
            text_chunks(&["It printed 2."]),
        ]));
        let agent = agent(scripted.clone());
        let (ctx, _) = ctx();
        let history = vec![Message::system("old instructions"), Message::user("print two")];

        let out = agent.take_step(&ctx, &history, agent.tools()).await.unwrap();
        agent
            .handle_tool_call_results(&ctx, &[execute_result(&out.tool_calls[0].tool_id, "2")])
            .await
            .unwrap();
        agent.take_step(&ctx, &history, agent.tools()).await.unwrap();

        let sent = scripted.requests();
        let second = &sent[1].messages;
        let roles: Vec<Role> = second.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(second[0].content, sent[0].messages[0].content);
        assert_eq!(second[2].content, "<execute>print(2)</execute>");

        let pad = ctx.scratchpad(DEFAULT_SCRATCHPAD_KEY).read().await.unwrap();
        assert_eq!(pad.len(), 3);
    }

    #[tokio::test]
    async fn failed_stream_leaves_scratchpad_and_phase() {
        let scripted = Arc::new(ScriptedModel::new(vec![
            text_chunks(&["<execute>x = 1</execute>"]),
            vec![
                Ok(codeact_core::provider::StreamChunk {
                    content: Some("half".into()),
                    ..Default::default()
                }),
                Err(codeact_core::error::ProviderError::StreamInterrupted("reset".into())),
            ],
        ]));
        let agent = agent(scripted);
        let (ctx, _) = ctx();
        let out = agent.take_step(&ctx, &[], agent.tools()).await.unwrap();
        agent
            .handle_tool_call_results(&ctx, &[execute_result(&out.tool_calls[0].tool_id, "")])
            .await
            .unwrap();
        let before = ctx.scratchpad(DEFAULT_SCRATCHPAD_KEY).read().await.unwrap();

        let err = agent.take_step(&ctx, &[], agent.tools()).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
        assert!(!err.is_fatal());
        assert_eq!(ctx.scratchpad(DEFAULT_SCRATCHPAD_KEY).read().await.unwrap(), before);
        assert_eq!(ctx.phase(), RunPhase::AwaitingToolResults);
    }

    #[tokio::test]
    async fn finalize_flushes_then_clears() {
        let scripted = Arc::new(ScriptedModel::new(vec![text_chunks(&["<execute>print(1)</execute>"])]));
        let agent = agent(scripted);
        let (ctx, _) = ctx();
        let memory = InMemoryChatMemory::new();

        let out = agent.take_step(&ctx, &[], agent.tools()).await.unwrap();
        agent
            .handle_tool_call_results(&ctx, &[execute_result(&out.tool_calls[0].tool_id, "1")])
            .await
            .unwrap();
        let before = ctx.scratchpad(DEFAULT_SCRATCHPAD_KEY).read().await.unwrap();

        let finished = agent.finalize(&ctx, out.clone(), &memory).await.unwrap();
        assert_eq!(finished.response, out.response);
        assert_eq!(memory.snapshot().await, before);
        assert!(ctx.scratchpad(DEFAULT_SCRATCHPAD_KEY).read().await.unwrap().is_empty());
        assert_eq!(ctx.phase(), RunPhase::Finalized);

        let again = agent.finalize(&ctx, out, &memory).await.unwrap_err();
        assert!(matches!(again, Error::Protocol(ProtocolError::RunFinalized { .. })));
        assert_eq!(memory.snapshot().await.len(), 2);

        let step = agent.take_step(&ctx, &[], agent.tools()).await.unwrap_err();
        assert!(matches!(step, Error::Protocol(ProtocolError::RunFinalized { .. })));
    }

    #[tokio::test]
    async fn failed_memory_write_keeps_scratchpad() {
        let scripted = Arc::new(ScriptedModel::new(vec![text_chunks(&["done"])]));
        let agent = agent(scripted);
        let (ctx, _) = ctx();
        let out = agent.take_step(&ctx, &[], agent.tools()).await.unwrap();

        let err = agent.finalize(&ctx, out, &BrokenMemory).await.unwrap_err();
        assert!(matches!(err, Error::Memory(_)));
        assert_eq!(ctx.scratchpad(DEFAULT_SCRATCHPAD_KEY).read().await.unwrap().len(), 1);
        assert_eq!(ctx.phase(), RunPhase::AwaitingToolResults);
    }

    /// Fails the first write of an empty scratchpad.
    struct FlakyClearStore {
        inner: InMemoryScratchpadStore,
        failed: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl ScratchpadStore for FlakyClearStore {
        fn name(&self) -> &str {
            "flaky_clear"
        }
        async fn read(&self, run: &RunId, key: &str) -> std::result::Result<Vec<Message>, MemoryError> {
            self.inner.read(run, key).await
        }
        async fn replace(
            &self,
            run: &RunId,
            key: &str,
            messages: Vec<Message>,
        ) -> std::result::Result<(), MemoryError> {
            if messages.is_empty() && !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(MemoryError::Storage("disk full".into()));
            }
            self.inner.replace(run, key, messages).await
        }
        async fn remove_run(&self, run: &RunId) -> std::result::Result<(), MemoryError> {
            self.inner.remove_run(run).await
        }
    }

    #[tokio::test]
    async fn failed_clear_after_flush_still_finalizes_once() {
        let scripted = Arc::new(ScriptedModel::new(vec![text_chunks(&["done"])]));
        let agent = agent(scripted);
        let store = Arc::new(FlakyClearStore {
            inner: InMemoryScratchpadStore::new(),
            failed: std::sync::atomic::AtomicBool::new(false),
        });
        let ctx = RunContext::with_run_id(RunId::from("run-1"), store, Arc::new(EventBus::default()));
        let memory = InMemoryChatMemory::new();

        let out = agent.take_step(&ctx, &[], agent.tools()).await.unwrap();
        agent.finalize(&ctx, out.clone(), &memory).await.unwrap();
        assert_eq!(memory.snapshot().await.len(), 1);
        assert_eq!(ctx.phase(), RunPhase::Finalized);

        let again = agent.finalize(&ctx, out, &memory).await.unwrap_err();
        assert!(matches!(again, Error::Protocol(ProtocolError::RunFinalized { .. })));
        assert_eq!(memory.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn step_publishes_input_stream_and_output_events() {
        let scripted = Arc::new(ScriptedModel::new(vec![text_chunks(&["a", "b"])]));
        let agent = agent(scripted);
        let (ctx, _) = ctx();
        let mut rx = ctx.events().subscribe();

        agent.take_step(&ctx, &[], agent.tools()).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.event_type());
        }
        assert_eq!(kinds, ["agent_input", "agent_stream", "agent_stream", "agent_output"]);
    }
}

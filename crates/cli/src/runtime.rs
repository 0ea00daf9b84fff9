//! Wiring from config to a ready agent runner.

use std::sync::Arc;
use std::time::Duration;

use codeact_agent::{AgentRunner, CodeActAgent};
use codeact_config::{AppConfig, MemoryBackend};
use codeact_core::memory::ChatMemory;
use codeact_core::store::ScratchpadStore;
use codeact_memory::{FileChatMemory, FileScratchpadStore, InMemoryChatMemory, InMemoryScratchpadStore, NoopMemory};
use codeact_tools::{HandoffTarget, PythonExecutor};
use tracing::debug;

/// Build the agent described by `config`.
pub fn build_agent(config: &AppConfig) -> Result<CodeActAgent, Box<dyn std::error::Error>> {
    let model = codeact_providers::build_from_config(config)?;
    let model_id = codeact_providers::model_for(config);

    let mut executor = PythonExecutor::new(&config.executor.interpreter)
        .with_timeout(Duration::from_secs(config.executor.timeout_secs));
    if let Some(dir) = &config.executor.working_dir {
        executor = executor.with_working_dir(dir.clone());
    }

    let mut builder = CodeActAgent::builder(model, model_id)
        .with_name(&config.agent.name)
        .with_description(&config.agent.description)
        .with_temperature(config.default_temperature)
        .with_scratchpad_key(&config.agent.scratchpad_key)
        .with_executor(Arc::new(executor));

    if let Some(prompt) = &config.agent.system_prompt {
        builder = builder.with_system_prompt(prompt);
    }
    if let Some(template) = config.code_act_prompt()? {
        builder = builder.with_code_act_prompt(template);
    }
    if let Some(max_tokens) = config.default_max_tokens {
        builder = builder.with_max_tokens(max_tokens);
    }

    let mut targets: Vec<HandoffTarget> = config
        .agent
        .can_handoff_to
        .iter()
        .map(|(name, description)| HandoffTarget::new(name, description))
        .collect();
    targets.sort_by(|a, b| a.name.cmp(&b.name));
    if !targets.is_empty() {
        builder = builder.with_handoff_targets(targets);
    }

    Ok(builder.build()?)
}

/// Chat memory and scratchpad store for the configured backend.
pub fn build_stores(config: &AppConfig) -> (Arc<dyn ChatMemory>, Arc<dyn ScratchpadStore>) {
    debug!(backend = ?config.memory.backend, "Opening memory");
    match config.memory.backend {
        MemoryBackend::File => {
            let scratch_root = AppConfig::config_dir().join("scratchpads");
            (
                Arc::new(FileChatMemory::new(config.memory_path())),
                Arc::new(FileScratchpadStore::new(scratch_root)),
            )
        }
        MemoryBackend::InMemory => (
            Arc::new(InMemoryChatMemory::new()),
            Arc::new(InMemoryScratchpadStore::new()),
        ),
        MemoryBackend::None => (Arc::new(NoopMemory), Arc::new(InMemoryScratchpadStore::new())),
    }
}

/// A runner for the configured agent and stores.
pub fn build_runner(config: &AppConfig) -> Result<AgentRunner, Box<dyn std::error::Error>> {
    let agent = build_agent(config)?;
    let (memory, scratchpads) = build_stores(config);
    Ok(AgentRunner::new(Arc::new(agent), memory, scratchpads).with_max_iterations(config.agent.max_iterations))
}

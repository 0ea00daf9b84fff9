//! `codeact chat`: interactive or single-message chat.

use std::io::Write;

use codeact_agent::{AgentRunner, RunOutcome};
use codeact_config::AppConfig;
use codeact_core::event::AgentEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::runtime;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    CODEACT_API_KEY     (generic)");
        eprintln!("    OPENAI_API_KEY      (for OpenAI direct)");
        eprintln!("    OPENROUTER_API_KEY  (for OpenRouter)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let runner = runtime::build_runner(&config)?;

    if let Some(msg) = message {
        let outcome = run_turn(&runner, &msg).await?;
        report(&outcome);
        return Ok(());
    }

    println!();
    println!("  codeact: interactive mode");
    println!();
    println!("  Provider:    {}", config.default_provider);
    println!("  Model:       {}", codeact_providers::model_for(&config));
    println!("  Agent:       {}", runner.agent().name());
    println!("  Interpreter: {}", config.executor.interpreter);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        println!();
        match run_turn(&runner, line).await {
            Ok(outcome) => report(&outcome),
            Err(e) => eprintln!("  [Error] {e}"),
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// Run one message, printing events as they arrive.
async fn run_turn(runner: &AgentRunner, input: &str) -> codeact_core::Result<RunOutcome> {
    let mut rx = runner.events().subscribe();
    let run = runner.run(input);
    tokio::pin!(run);

    loop {
        tokio::select! {
            outcome = &mut run => {
                while let Ok(event) = rx.try_recv() {
                    render(&event);
                }
                return outcome;
            }
            event = rx.recv() => match event {
                Ok(event) => render(&event),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event printer lagged"),
                Err(RecvError::Closed) => return (&mut run).await,
            }
        }
    }
}

fn render(event: &AgentEvent) {
    match event {
        AgentEvent::AgentInput { input, current_agent_name } => {
            debug!(agent = %current_agent_name, messages = input.len(), "Step input");
        }
        AgentEvent::AgentStream { delta, .. } => {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        }
        AgentEvent::AgentOutput { .. } => println!(),
        AgentEvent::ToolCallResult { tool_name, tool_output, .. } => {
            let marker = if tool_output.is_error { "error" } else { "ok" };
            eprintln!("  [{tool_name}: {marker}]");
            for line in tool_output.content.lines() {
                eprintln!("  | {line}");
            }
            eprintln!();
        }
    }
}

fn report(outcome: &RunOutcome) {
    if let Some(target) = &outcome.handoff_to {
        println!("  (handed off to {target})");
    }
    debug!(
        run_id = %outcome.run_id,
        iterations = outcome.iterations,
        tool_calls = outcome.tool_calls_made,
        "Turn complete"
    );
}

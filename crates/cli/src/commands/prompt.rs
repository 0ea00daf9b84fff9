//! `codeact prompt`: show the assembled system prompt.

use codeact_config::AppConfig;

use crate::runtime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let agent = runtime::build_agent(&config)?;
    println!("{}", agent.system_prompt(agent.tools())?);
    Ok(())
}

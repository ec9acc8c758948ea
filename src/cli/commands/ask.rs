//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ask command: one message, one agent turn.
pub async fn run_ask(
    message: &str,
    model: Option<String>,
    max_rounds: Option<usize>,
    mut settings: Settings,
) -> Result<()> {
    if let Some(model) = model {
        settings.model.name = model;
    }
    if let Some(max_rounds) = max_rounds {
        settings.agent.max_rounds = max_rounds;
    }

    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'kall doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Thinking...");
    let result = match orchestrator.agent().await {
        Ok(mut agent) => agent.chat(message).await,
        Err(e) => Err(e),
    };
    spinner.finish_and_clear();

    match result {
        Ok(response) => {
            if !response.tool_calls.is_empty() {
                Output::header("Tool calls");
                for record in &response.tool_calls {
                    Output::tool_call(record);
                }
                println!();
            }
            println!("{}", response.content);
        }
        Err(e) => {
            Output::error(&format!("Agent failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}

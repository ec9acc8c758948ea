//! Interactive chat command.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(model: Option<String>, mut settings: Settings) -> Result<()> {
    if let Some(model) = model {
        settings.model.name = model;
    }

    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'kall doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Indexing policy documents...");
    let agent = orchestrator.agent().await;
    spinner.finish_and_clear();
    let mut agent = agent?;

    println!("\n{}", style("Kall Chat").bold().cyan());
    println!(
        "{}\n",
        style("Type a message, or 'exit' to quit. Use 'reset' to start over.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("reset") || input.eq_ignore_ascii_case("clear") {
            agent.reset();
            Output::info("Conversation history cleared.");
            continue;
        }

        match agent.chat(input).await {
            Ok(response) => {
                for record in &response.tool_calls {
                    Output::tool_call(record);
                }
                println!("\n{} {}\n", style("Kall:").cyan().bold(), response.content);
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}

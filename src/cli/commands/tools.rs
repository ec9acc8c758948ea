//! Tools command - list what the agent can call.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::tools::ToolSchema;
use anyhow::Result;
use console::style;

/// Run the tools command.
pub async fn run_tools(settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Tools, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Loading tools...");
    let registry = orchestrator.registry().await;
    spinner.finish_and_clear();
    let registry = registry?;

    Output::header(&format!("Tools ({})", registry.len()));
    for schema in registry.schemas() {
        print_schema(schema);
    }
    println!();

    Ok(())
}

fn print_schema(schema: &ToolSchema) {
    println!("\n  {}", style(&schema.name).bold().cyan());
    println!("  {}", schema.description);
    for param in &schema.parameters {
        let required = if param.required { "required" } else { "optional" };
        Output::kv(
            &param.name,
            &format!("{:?}, {} - {}", param.kind, required, param.description),
        );
    }
}

//! CLI output formatting utilities.

use crate::agent::{preview, ToolCallRecord};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print one tool call made during a turn.
    pub fn tool_call(record: &ToolCallRecord) {
        let marker = if record.is_error {
            style("!").red()
        } else {
            style("-").dim()
        };
        println!(
            "  {} {} {} {}",
            marker,
            style(record).cyan(),
            style("->").dim(),
            preview(&record.result, 100)
        );
    }

    /// Print search result.
    pub fn search_result(rank: usize, title: Option<&str>, score: f32, content: &str) {
        println!(
            "\n{} {} (score: {:.3})",
            style(format!("{}.", rank)).green(),
            style(title.unwrap_or("(untitled)")).bold(),
            score
        );
        println!("   {}", preview(content, 200));
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

//! Doctor command - verify configuration and connectivity.

use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::retrieval::corpus::CorpusSource;
use console::style;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Kall Doctor");
    println!();
    println!("Checking configuration and connectivity...\n");

    let mut checks = Vec::new();

    println!("{}", style("API Configuration").bold());
    let key_check = check_api_key(settings);
    key_check.print();
    let has_key = key_check.status != CheckStatus::Error;
    checks.push(key_check);

    if has_key {
        let connectivity = check_connectivity(settings).await;
        connectivity.print();
        checks.push(connectivity);
    }

    println!();

    println!("{}", style("Data").bold());
    for check in [check_corpus(settings), check_travel_db(settings)] {
        check.print();
        checks.push(check);
    }

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!("{} error(s) found. Please fix them before using Kall.", errors));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Kall is ready to use.");
    }

    Ok(())
}

/// Show a key as its first and last few characters.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Check if an OpenAI API key is configured.
fn check_api_key(settings: &Settings) -> CheckResult {
    match settings.openai.api_key.as_deref().map(str::trim) {
        Some(key) if key.starts_with("sk-") && key.len() > 20 => {
            CheckResult::ok("API key", &format!("configured ({})", mask_key(key)))
        }
        Some(key) if !key.is_empty() => CheckResult::warning(
            "API key",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        _ => CheckResult::error(
            "API key",
            "not set",
            "Pass --api-key or export OPENAI_API_KEY='sk-...'",
        ),
    }
}

/// Embed a short text to check that the API answers.
async fn check_connectivity(settings: &Settings) -> CheckResult {
    let embedder = match OpenAIEmbedder::new(&settings.openai, &settings.embedding) {
        Ok(embedder) => embedder,
        Err(e) => return CheckResult::error("Embeddings", &e.to_string(), "Check [openai] settings"),
    };

    match embedder.embed("ping").await {
        Ok(vector) => CheckResult::ok(
            "Embeddings",
            &format!("{} answered ({} dimensions)", embedder.model(), vector.len()),
        ),
        Err(e) if e.is_transient() => {
            CheckResult::warning("Embeddings", &e.to_string(), "The service may be temporarily unavailable")
        }
        Err(e) => CheckResult::error("Embeddings", &e.to_string(), "Check the API key and model name"),
    }
}

/// Check that the policy corpus source is usable.
fn check_corpus(settings: &Settings) -> CheckResult {
    match CorpusSource::parse(&settings.corpus.source) {
        Ok(CorpusSource::File(path)) if !path.exists() => CheckResult::error(
            "Policy corpus",
            &format!("{} not found", path.display()),
            "Set corpus.source to an existing file or an http(s) URL",
        ),
        Ok(_) => CheckResult::ok("Policy corpus", &settings.corpus.source),
        Err(e) => CheckResult::error(
            "Policy corpus",
            &e.to_string(),
            "Set corpus.source to a file path or an http(s) URL",
        ),
    }
}

/// Check the travel database working copy.
fn check_travel_db(settings: &Settings) -> CheckResult {
    let path = settings.travel_db_path();
    match std::fs::metadata(&path) {
        Ok(meta) => CheckResult::ok(
            "Travel database",
            &format!("{} ({})", path.display(), format_size(meta.len())),
        ),
        Err(_) => CheckResult::warning(
            "Travel database",
            &format!("{} (not downloaded)", path.display()),
            "Download with: kall travel-db prepare",
        ),
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning("Config file", "using defaults", "Create with: kall config init")
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_checks() {
        let mut settings = Settings::default();
        assert_eq!(check_api_key(&settings).status, CheckStatus::Error);

        settings.openai.api_key = Some("local-key".to_string());
        assert_eq!(check_api_key(&settings).status, CheckStatus::Warning);

        settings.openai.api_key = Some("sk-proj-abcdefghijklmnopqrstuvwxyz".to_string());
        let result = check_api_key(&settings);
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.message.contains("sk-proj...wxyz"));
    }

    #[test]
    fn test_missing_corpus_file() {
        let mut settings = Settings::default();
        settings.corpus.source = "/nonexistent/kall/faq.md".to_string();
        assert_eq!(check_corpus(&settings).status, CheckStatus::Error);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}

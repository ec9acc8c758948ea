//! Configuration settings for Kall.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub openai: OpenAISettings,
    pub model: ModelSettings,
    pub embedding: EmbeddingSettings,
    pub retry: RetrySettings,
    pub agent: AgentSettings,
    pub corpus: CorpusSettings,
    pub travel_db: TravelDbSettings,
    pub server: ServerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Credentials and transport settings for the OpenAI API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAISettings {
    /// API key. The CLI fills this from `--api-key` / `OPENAI_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Alternative API base URL (e.g. a local OpenAI-compatible server).
    pub api_base: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            timeout_seconds: 300,
        }
    }
}

impl OpenAISettings {
    /// Check if a non-empty API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Chat model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Chat completion model identifier.
    pub name: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// System prompt prepended to every request. Empty disables it.
    pub system_prompt: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Default system prompt for the agent.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful customer support assistant for Swiss Airlines.

Use the provided tools to do arithmetic and to look up company policies.
Consult 'lookup_policy' before answering questions about flight changes,
cancellations, baggage or other permitted options.

When a tool reports an error, correct the call or explain the problem to the user."#;

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Backoff settings for remote calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,
    /// Cap on a single delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
        }
    }
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum tool-dispatch rounds per user message.
    pub max_rounds: usize,
    /// Run the tool calls of one batch concurrently.
    pub parallel_tools: bool,
    /// Characters of message content kept in log lines.
    pub log_preview_chars: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            parallel_tools: false,
            log_preview_chars: 120,
        }
    }
}

/// Policy corpus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    /// URL or file path of the markdown FAQ to index.
    pub source: String,
    /// Documents returned by the `lookup_policy` tool.
    pub lookup_k: usize,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            source: "https://storage.googleapis.com/benchmarks-artifacts/travel-db/swiss_faq.md"
                .to_string(),
            lookup_k: 2,
        }
    }
}

/// Travel database snapshot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelDbSettings {
    /// Where to download the snapshot from.
    pub url: String,
    /// Working copy of the database.
    pub path: String,
    /// Pristine copy used by `travel-db reset`.
    pub backup_path: String,
}

impl Default for TravelDbSettings {
    fn default() -> Self {
        Self {
            url: "https://storage.googleapis.com/benchmarks-artifacts/travel-db/travel2.sqlite"
                .to_string(),
            path: "~/.kall/travel2.sqlite".to_string(),
            backup_path: "~/.kall/travel2.backup.sqlite".to_string(),
        }
    }
}

/// HTTP API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Sessions kept at once; the least recently used one is dropped first.
    pub max_sessions: usize,
    /// Seconds a session may stay unused before it is dropped.
    pub session_idle_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            session_idle_secs: 30 * 60,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::KallError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kall")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded travel database path.
    pub fn travel_db_path(&self) -> PathBuf {
        Self::expand_path(&self.travel_db.path)
    }

    /// Get the expanded travel database backup path.
    pub fn travel_db_backup_path(&self) -> PathBuf {
        Self::expand_path(&self.travel_db.backup_path)
    }

    /// The system prompt, or None when disabled.
    pub fn system_prompt(&self) -> Option<&str> {
        let prompt = self.model.system_prompt.trim();
        (!prompt.is_empty()).then_some(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [agent]
            max_rounds = 3

            [retry]
            max_retries = 2
            "#,
        )
        .unwrap();

        assert_eq!(settings.agent.max_rounds, 3);
        assert!(!settings.agent.parallel_tools);
        assert_eq!(settings.retry.max_retries, 2);
        assert_eq!(settings.retry.initial_delay_ms, 1000);
        assert_eq!(settings.embedding.model, "text-embedding-3-small");
        assert_eq!(settings.corpus.lookup_k, 2);
        assert_eq!(settings.server.max_sessions, 100);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.model.name = "gpt-4.1".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.model.name, "gpt-4.1");
    }

    #[test]
    fn test_api_key_not_written_when_absent() {
        let content = toml::to_string_pretty(&Settings::default()).unwrap();
        assert!(!content.contains("api_key"));
    }

    #[test]
    fn test_empty_system_prompt_disables_it() {
        let mut settings = Settings::default();
        assert!(settings.system_prompt().is_some());
        settings.model.system_prompt = "   ".to_string();
        assert_eq!(settings.system_prompt(), None);
    }

    #[test]
    fn test_has_api_key() {
        let mut openai = OpenAISettings::default();
        assert!(!openai.has_api_key());
        openai.api_key = Some(" ".to_string());
        assert!(!openai.has_api_key());
        openai.api_key = Some("sk-test".to_string());
        assert!(openai.has_api_key());
    }
}

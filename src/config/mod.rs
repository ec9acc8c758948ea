//! Configuration module for Kall.
//!
//! Handles loading and saving application settings. All values reach the
//! library through [`Settings`]; nothing reads the process environment
//! below the CLI entry point.

mod settings;

pub use settings::{
    AgentSettings, CorpusSettings, EmbeddingSettings, GeneralSettings, ModelSettings,
    OpenAISettings, RetrySettings, ServerSettings, Settings, TravelDbSettings,
    DEFAULT_SYSTEM_PROMPT,
};

//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration is available before starting
//! operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{KallError, Result};
use crate::retrieval::corpus::CorpusSource;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Talking to the agent needs the API key and a usable corpus source.
    Chat,
    /// Searching embeds the corpus, so it needs the same.
    Search,
    /// Listing tools builds the registry, which embeds the corpus.
    Tools,
    /// Preparing the travel database needs a download URL.
    TravelDb,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Chat | Operation::Search | Operation::Tools => {
            check_api_key(settings)?;
            check_corpus(settings)?;
        }
        Operation::TravelDb => {
            if settings.travel_db.url.trim().is_empty() {
                return Err(KallError::Config("travel_db.url is empty".to_string()));
            }
        }
    }
    Ok(())
}

/// Check if an OpenAI API key is configured.
fn check_api_key(settings: &Settings) -> Result<()> {
    if settings.openai.has_api_key() {
        Ok(())
    } else {
        Err(KallError::Config(
            "OpenAI API key not set. Pass --api-key or export OPENAI_API_KEY='sk-...'".to_string(),
        ))
    }
}

/// Check that the corpus source parses.
fn check_corpus(settings: &Settings) -> Result<()> {
    CorpusSource::parse(&settings.corpus.source).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_requires_api_key() {
        let mut settings = Settings::default();
        assert!(matches!(
            check(Operation::Chat, &settings),
            Err(KallError::Config(_))
        ));

        settings.openai.api_key = Some("sk-test".to_string());
        assert!(check(Operation::Chat, &settings).is_ok());
    }

    #[test]
    fn test_travel_db_needs_no_key() {
        assert!(check(Operation::TravelDb, &Settings::default()).is_ok());
    }
}

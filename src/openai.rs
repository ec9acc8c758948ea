//! OpenAI client construction from explicit settings.

use crate::config::OpenAISettings;
use crate::error::{KallError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Create an OpenAI client from settings.
///
/// The API key must be present in `settings`; the process environment is
/// not consulted. The client makes a single attempt per request so that
/// [`RetryPolicy`](crate::retry::RetryPolicy) alone decides about retries.
pub fn create_client(settings: &OpenAISettings) -> Result<Client<OpenAIConfig>> {
    let api_key = settings
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| KallError::Config("OpenAI API key is not configured".to_string()))?;

    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = &settings.api_base {
        config = config.with_api_base(base);
    }

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_seconds))
        .build()?;

    Ok(Client::with_config(config)
        .with_http_client(http_client)
        .with_backoff(single_attempt()))
}

/// Backoff that gives up after the first failure.
fn single_attempt() -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

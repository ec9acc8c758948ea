//! Error types for Kall.

use thiserror::Error;

/// Failure of a single call to a remote model or embedding endpoint.
///
/// Each variant is either transient (worth retrying) or fatal; see
/// [`RemoteError::is_transient`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl RemoteError {
    /// Whether the same request may succeed if sent again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::Connection(_)
                | RemoteError::Timeout(_)
                | RemoteError::RateLimited(_)
                | RemoteError::Server(_)
        )
    }
}

impl From<async_openai::error::OpenAIError> for RemoteError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        use async_openai::error::OpenAIError;

        match err {
            OpenAIError::Reqwest(e) => classify_reqwest(&e),
            OpenAIError::ApiError(api) => {
                let message = api.message;
                match api.r#type.as_deref() {
                    Some("server_error" | "overloaded_error" | "api_error") => {
                        RemoteError::Server(message)
                    }
                    Some("rate_limit_error" | "requests" | "tokens") => RemoteError::RateLimited(message),
                    Some("authentication_error" | "permission_error") => {
                        RemoteError::Authentication(message)
                    }
                    _ if message.contains("API key") => RemoteError::Authentication(message),
                    // A 5xx response comes back untyped, with the raw body as message.
                    None => RemoteError::Server(message),
                    Some(_) => RemoteError::BadRequest(message),
                }
            }
            OpenAIError::JSONDeserialize(e) => RemoteError::MalformedResponse(e.to_string()),
            other => RemoteError::BadRequest(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        classify_reqwest(&err)
    }
}

fn classify_reqwest(err: &reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        return RemoteError::Timeout(err.to_string());
    }
    if err.is_connect() {
        return RemoteError::Connection(err.to_string());
    }
    match err.status() {
        Some(status) if status.as_u16() == 429 => RemoteError::RateLimited(err.to_string()),
        Some(status) if status.is_server_error() => RemoteError::Server(err.to_string()),
        Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
            RemoteError::Authentication(err.to_string())
        }
        Some(_) => RemoteError::BadRequest(err.to_string()),
        None if err.is_decode() || err.is_body() => RemoteError::MalformedResponse(err.to_string()),
        // Anything else happened on the wire before a status came back.
        None => RemoteError::Connection(err.to_string()),
    }
}

/// Library-level error type for Kall operations.
#[derive(Error, Debug)]
pub enum KallError {
    #[error("Service error: {0}")]
    Service(#[from] RemoteError),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool '{tool}' failed: {source}")]
    ToolExecution {
        tool: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Agent exceeded maximum tool-dispatch rounds ({0})")]
    MaxRoundsExceeded(usize),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Travel database error: {0}")]
    TravelDb(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for Kall operations.
pub type Result<T> = std::result::Result<T, KallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RemoteError::Connection("reset".into()).is_transient());
        assert!(RemoteError::Timeout("30s".into()).is_transient());
        assert!(RemoteError::RateLimited("slow down".into()).is_transient());
        assert!(RemoteError::Server("502".into()).is_transient());

        assert!(!RemoteError::Authentication("bad key".into()).is_transient());
        assert!(!RemoteError::BadRequest("no model".into()).is_transient());
        assert!(!RemoteError::MalformedResponse("eof".into()).is_transient());
    }

    #[test]
    fn test_api_error_classification() {
        use async_openai::error::{ApiError, OpenAIError};

        let api = |kind: &str, message: &str| {
            OpenAIError::ApiError(ApiError {
                message: message.to_string(),
                r#type: Some(kind.to_string()),
                param: None,
                code: None,
            })
        };

        assert_eq!(
            RemoteError::from(api("server_error", "boom")),
            RemoteError::Server("boom".into())
        );
        assert_eq!(
            RemoteError::from(api("invalid_request_error", "Incorrect API key provided")),
            RemoteError::Authentication("Incorrect API key provided".into())
        );
        assert_eq!(
            RemoteError::from(api("invalid_request_error", "model not found")),
            RemoteError::BadRequest("model not found".into())
        );
    }

    #[test]
    fn test_untyped_api_error_is_server_error() {
        use async_openai::error::{ApiError, OpenAIError};

        let err = RemoteError::from(OpenAIError::ApiError(ApiError {
            message: "upstream overloaded".to_string(),
            r#type: None,
            param: None,
            code: None,
        }));

        assert_eq!(err, RemoteError::Server("upstream overloaded".into()));
        assert!(err.is_transient());
    }
}

//! Kall - a tool-calling agent over hosted chat models
//!
//! Kall runs a bounded tool-calling loop against an OpenAI-compatible chat
//! completion API, with retrying remote calls, schema-validated tools and
//! a small in-memory embedding index for policy lookup.
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `retry` - Exponential backoff for remote calls
//! - `embedding` - Embedding generation
//! - `retrieval` - Corpus loading and the brute-force embedding index
//! - `tools` - Tool trait, argument schemas and the tool registry
//! - `agent` - Conversation history and the agent loop
//! - `travel_db` - Travel database snapshot preparation
//! - `orchestrator` - Wiring of the components above
//!
//! # Example
//!
//! ```rust,no_run
//! use kall::config::Settings;
//! use kall::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut settings = Settings::load()?;
//!     settings.openai.api_key = std::env::var("OPENAI_API_KEY").ok();
//!
//!     let orchestrator = Orchestrator::new(settings)?;
//!     let mut agent = orchestrator.agent().await?;
//!
//!     let response = agent.chat("What is 3 times 5?").await?;
//!     println!("{}", response.content);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod retrieval;
pub mod retry;
pub mod tools;
pub mod travel_db;

pub use error::{KallError, RemoteError, Result};

//! CLI module for Kall.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Kall - a tool-calling agent over hosted chat models
///
/// Chat with an agent that can do arithmetic and look up airline policy,
/// search the policy corpus, and prepare the travel database snapshot.
#[derive(Parser, Debug)]
#[command(name = "kall")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session with the agent
    Chat {
        /// Chat model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Send a single message to the agent and print the answer
    Ask {
        /// The message to send
        message: String,

        /// Chat model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum tool-dispatch rounds
        #[arg(long)]
        max_rounds: Option<usize>,
    },

    /// Search the policy corpus
    Search {
        /// Search query
        query: String,

        /// Number of results
        #[arg(short, long, default_value = "3")]
        k: usize,
    },

    /// List the tools available to the agent
    Tools,

    /// Manage the travel database snapshot
    TravelDb {
        #[command(subcommand)]
        action: TravelDbAction,
    },

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Check configuration and connectivity
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum TravelDbAction {
    /// Download the snapshot if needed and shift its dates to the present
    Prepare {
        /// Download again even if a working copy exists
        #[arg(short, long)]
        force: bool,
    },

    /// Restore the working copy from the backup
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

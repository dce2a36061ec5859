//! Command-line interface definition for ctxtrim
//!
//! This module defines the CLI structure using clap's derive API. Global
//! flags override configuration; each subcommand maps to one operation of
//! the library.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ctxtrim - token estimation, cost accounting and history compression for chats
#[derive(Parser, Debug, Clone)]
#[command(name = "ctxtrim")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the message history database path
    #[arg(long, env = "CTXTRIM_HISTORY_DB")]
    pub storage_path: Option<String>,

    /// Fallback provider for messages without one (openai, claude, deepseek)
    #[arg(long)]
    pub provider: Option<String>,

    /// Fallback model for messages without one
    #[arg(long)]
    pub model: Option<String>,

    /// Pricing tier (standard, batch, flex, priority)
    #[arg(long)]
    pub tier: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for ctxtrim
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Import a JSON array of messages into the history database
    Import {
        /// Path to the JSON export
        file: PathBuf,
    },

    /// List stored chats
    Chats {
        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show per-message token estimates for a chat
    Tokens {
        /// Chat identifier
        chat_id: i64,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Estimate the cost of a chat
    Cost {
        /// Chat identifier
        chat_id: i64,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Preview the effect of an optimization strategy without changing anything
    Preview {
        /// Chat identifier
        chat_id: i64,

        /// Strategy override (none, rolling-window, smart-summary, rolling-with-summary)
        #[arg(short, long)]
        strategy: Option<String>,

        /// Rolling window size override
        #[arg(short, long)]
        window: Option<usize>,

        /// Summary threshold override (tokens)
        #[arg(short, long)]
        threshold: Option<usize>,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Replace old messages with a persisted summary checkpoint
    Compress {
        /// Chat identifier
        chat_id: i64,

        /// Summary threshold override (tokens)
        #[arg(short, long)]
        threshold: Option<usize>,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show pricing rates
    Pricing {
        /// Provider to look up; lists the whole table when omitted
        provider: Option<String>,

        /// Model to look up
        model: Option<String>,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            storage_path: None,
            provider: None,
            model: None,
            tier: None,
            command: Commands::Chats { json: false },
        }
    }
}

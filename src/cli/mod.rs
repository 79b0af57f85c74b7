//! CLI module for Replikk.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Replikk - Grounded Script QA
///
/// A local-first CLI tool for asking questions about a movie script, answered
/// only from the script itself. The name "Replikk" comes from the Norwegian
/// word for a spoken line in a play.
#[derive(Parser, Debug)]
#[command(name = "replikk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a script file: segment, embed and index it
    Ingest {
        /// Path to the script file (screenplay text or JSONL records)
        path: String,

        /// Corpus identifier (defaults to configured corpus)
        #[arg(long)]
        corpus: Option<String>,

        /// Corpus version; bump when the script text changes
        #[arg(long)]
        version: Option<String>,

        /// Re-index even if the corpus is already indexed
        #[arg(short, long)]
        force: bool,
    },

    /// Ask a question and get a cited answer from the script
    Ask {
        /// The question to ask
        question: String,

        /// Show the executed reasoning steps
        #[arg(long)]
        steps: bool,
    },

    /// Search for relevant script chunks
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Restrict to chunks where this speaker appears
        #[arg(long)]
        speaker: Option<String>,

        /// Restrict to scenes whose heading contains this text
        #[arg(long)]
        scene: Option<String>,
    },

    /// List indexed corpora
    List,

    /// Start the HTTP query API
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "retrieval.top_k")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Show configuration file path
    Path,
}

//! Command-line interface definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sampark - community directory assistant
#[derive(Parser, Debug)]
#[command(name = "sampark", version, about)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run query understanding on one query and print the extraction
    Extract {
        /// The free-text query to analyze
        query: String,

        /// Invoke the LLM fallback when regex confidence is low
        /// (requires llm.enabled and an API key)
        #[arg(long)]
        llm: bool,

        /// Print the raw extraction as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the standard location)
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

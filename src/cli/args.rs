//! Command line argument parsing for the scopesearch CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// scopesearch - scoped boolean search over registered entity types
#[derive(Parser, Debug, Clone)]
#[command(name = "scopesearch")]
#[command(about = "Scoped boolean search over registered entity types")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct ScopeSearchArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Search configuration file (JSON)
    #[arg(long, value_name = "CONFIG_FILE", env = "SCOPESEARCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl ScopeSearchArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a scoped query against a fixture
    Search(SearchArgs),

    /// Show registered entity types and their indexing topology
    Describe(DescribeArgs),
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Fixture file describing models, entity types and records (JSON)
    #[arg(value_name = "FIXTURE")]
    pub fixture: PathBuf,

    /// Entity type to search, as namespace.kind
    #[arg(short, long)]
    pub entity: String,

    /// Actor the search runs for
    #[arg(short, long, default_value = "anonymous")]
    pub actor: String,

    /// Combine the fields of a scope with AND unless the scope says otherwise
    #[arg(long)]
    pub match_all: bool,

    /// Query entries, e.g. q=report or __A__title=alpha
    #[arg(value_name = "KEY=VALUE")]
    pub query: Vec<String>,
}

/// Arguments for describing a fixture
#[derive(Parser, Debug, Clone)]
pub struct DescribeArgs {
    /// Fixture file describing models, entity types and records (JSON)
    #[arg(value_name = "FIXTURE")]
    pub fixture: PathBuf,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

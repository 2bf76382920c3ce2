//! CLI parse: clap types for Bookwise. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bookwise CLI - generate and inspect LLM book insights
#[derive(Parser)]
#[command(name = "bookwise")]
#[command(about = "Generate and inspect LLM-written book insights, at most once per cache key")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (when output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Generate one section for a book, or serve it from the store
    Generate {
        /// Open Library work id (e.g. OL45804W)
        book_id: String,
        /// Section: overview, key_ideas, chapters, critique
        section: String,
        /// Regenerate even if a completed or failed record exists
        #[arg(long)]
        force: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Print generation metrics after the result
        #[arg(long)]
        metrics: bool,
    },
    /// List stored generation records for a book
    Status {
        /// Open Library work id
        book_id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

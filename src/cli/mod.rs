//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "citeline",
    version,
    about = "Hybrid vector + graph evidence retrieval with citation checks",
    long_about = "Citeline indexes filing text into a vector index and an entity co-occurrence graph, \
                  retrieves citable evidence packs for research questions, runs guarded read-only SQL \
                  against a research database, and verifies that every synthesized claim cites evidence."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/citeline/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile to apply on top of the config file
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the vector and graph indexes from a document directory
    Build {
        /// Directory of documents (overrides indexing.docs_dir)
        #[arg(short, long, value_name = "DIR")]
        docs_dir: Option<PathBuf>,
    },

    /// Retrieve an evidence pack for a query
    Retrieve {
        /// Query text
        query: String,

        /// Number of seed chunks from vector search
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Co-occurring neighbors explored per seed entity
        #[arg(long)]
        hop_k: Option<usize>,

        /// Write the pack to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Run a guarded read-only query against the research database
    Sql {
        /// SELECT statement
        query: String,
    },

    /// Check citations in a synthesized research draft
    Verify {
        /// Draft JSON file
        draft: PathBuf,

        /// Evidence pack JSON files the draft cites (enables dangling checks)
        #[arg(long = "pack", value_name = "FILE")]
        packs: Vec<PathBuf>,

        /// SQL result JSON files the draft cites
        #[arg(long = "sql-result", value_name = "FILE")]
        sql_results: Vec<PathBuf>,

        /// Also render the markdown note to this file
        #[arg(long, value_name = "FILE")]
        note: Option<PathBuf>,
    },

    /// Show index statistics
    Stats,

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

    /// Validate configuration file
    Validate {
        /// Config file to validate (defaults to current config)
        file: Option<PathBuf>,
    },

    /// Initialize default configuration and entity rule table
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

//! Top-level CLI grammar, clap-derive: init/config, full and incremental
//! indexing, the four query forms, remove/rename, and serve.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "graphkeep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Workspace code-graph indexer")]
pub struct Cli {
    /// Path to an explicit settings.toml, bypassing the `.graphkeep/` search.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default `.graphkeep/settings.toml`.
    Init {
        #[arg(short, long)]
        force: bool,
    },

    /// Print the resolved configuration.
    Config,

    /// Run a full workspace index.
    Index {
        /// Workspace root to index.
        path: PathBuf,
    },

    /// Apply incremental file events without a full re-index.
    Add {
        workspace: PathBuf,
        paths: Vec<PathBuf>,
    },

    /// Remove one or more files (or folders, by prefix) from the index.
    Remove {
        workspace: PathBuf,
        paths: Vec<PathBuf>,
    },

    /// Update the index after a file or folder rename.
    Rename {
        workspace: PathBuf,
        src: PathBuf,
        dst: PathBuf,
    },

    /// Drop every index under a workspace.
    Clean { workspace: PathBuf },

    /// Read-only lookups over an indexed workspace.
    Query {
        #[command(subcommand)]
        query: QueryCommand,
    },

    /// Start the HTTP API.
    Serve,
}

#[derive(Subcommand)]
pub enum QueryCommand {
    /// Definitions visible at a location, or reachable from a code snippet.
    Definition {
        workspace: PathBuf,
        file: PathBuf,
        #[arg(long)]
        start_line: Option<u32>,
        #[arg(long)]
        end_line: Option<u32>,
        #[arg(long)]
        snippet: Option<String>,
    },

    /// Direct references to the definition at a location.
    Reference {
        workspace: PathBuf,
        file: PathBuf,
        #[arg(long)]
        start_line: u32,
        #[arg(long)]
        end_line: u32,
        #[arg(long)]
        symbol: Option<String>,
    },

    /// Layered call graph descending from a location.
    Callgraph {
        workspace: PathBuf,
        file: PathBuf,
        #[arg(long)]
        start_line: u32,
        #[arg(long)]
        end_line: u32,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long, default_value_t = 3)]
        max_layer: u32,
    },

    /// Every element in a file, optionally filtered by kind.
    Structure {
        workspace: PathBuf,
        file: PathBuf,
        #[arg(long, value_delimiter = ',')]
        kinds: Vec<String>,
    },

    /// Aggregate file counts across a workspace's projects.
    Summary { workspace: PathBuf },
}

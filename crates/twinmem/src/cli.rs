use std::path::PathBuf;

use clap::{Parser, Subcommand};
use twinmem_config::Transport;

use crate::tools::DEFAULT_SEARCH_LIMIT;

#[derive(Parser)]
#[command(name = "twinmem")]
#[command(about = "Dual-provider memory server: every memory is stored on two providers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ~/.config/twinmem/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the MCP server
    Serve {
        /// Transport: stdio or http (JSON-RPC over POST /mcp)
        #[arg(long)]
        transport: Option<Transport>,

        /// Bind address for the http transport
        #[arg(long)]
        host: Option<String>,

        /// Port for the http transport
        #[arg(long)]
        port: Option<u16>,
    },

    /// Check whether both providers answer
    Health,

    /// Compare memory counts of both providers
    Sync,

    /// List all memories
    List,

    /// Search memories
    Search {
        /// Natural-language query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// Store a memory on both providers
    Add {
        /// Content to remember
        text: String,
    },

    /// Show/validate configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration with secrets masked
    Show,
    /// Check that both provider slots resolve
    Validate,
}

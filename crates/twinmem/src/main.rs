use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

mod bootstrap;
mod cli;
mod config_cmds;
mod mcp_server;
mod tools;

#[cfg(test)]
mod test_support;

use cli::{Cli, Commands, ConfigCommands};
use mcp_server::McpServer;
use tools::ToolOutput;
use twinmem_config::{ServerConfig, Transport};

#[tokio::main]
async fn main() -> Result<()> {
    // A local .env may carry provider keys and RUST_LOG.
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("WARNING: failed to load .env: {e}");
    }

    // Initialize tracing (output to stderr, stdout carries the stdio transport)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let mut config = ServerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            transport,
            host,
            port,
        } => {
            if let Some(transport) = transport {
                config.server.transport = transport;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let server = Arc::new(McpServer::new(bootstrap::build_tools(&config).await));
            match config.server.transport {
                Transport::Stdio => mcp_server::run_stdio(server).await?,
                Transport::Http => {
                    mcp_server::run_http(server, &config.server.host, config.server.port).await?
                }
            }
        }
        Commands::Health => {
            let tools = bootstrap::build_tools(&config).await;
            print_output(tools.check_provider_health().await);
        }
        Commands::Sync => {
            let tools = bootstrap::build_tools(&config).await;
            print_output(tools.sync_providers().await);
        }
        Commands::List => {
            let tools = bootstrap::build_tools(&config).await;
            print_output(tools.get_all_memories().await);
        }
        Commands::Search { query, limit } => {
            let tools = bootstrap::build_tools(&config).await;
            print_output(tools.search_memories(&query, limit).await);
        }
        Commands::Add { text } => {
            let tools = bootstrap::build_tools(&config).await;
            print_output(tools.save_memory(&text).await);
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show => config_cmds::handle_config_show(&config),
            ConfigCommands::Validate => config_cmds::handle_config_validate(&config)?,
        },
    }

    Ok(())
}

/// Print a one-shot tool result; tool errors exit with status 1.
fn print_output(output: ToolOutput) {
    println!("{}", output.text);
    if output.is_error {
        std::process::exit(1);
    }
}

mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mem42::config::Mem42Config;

#[derive(Parser)]
#[command(name = "mem42", version, about = "Collaborative synthesis engine with an engram knowledge base")]
struct Cli {
    /// Path to a config file (defaults to ~/.mem42/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API with Server-Sent Events
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Start the MCP server (stdio transport)
    Mcp,
    /// Answer a query through collaborative synthesis
    Ask {
        query: String,
        /// Comma-separated tags restricting retrieval
        #[arg(long)]
        tags: Option<String>,
        /// Distill the answer into a stored memory point
        #[arg(long)]
        memory: bool,
    },
    /// Ingest text files into the knowledge base
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Comma-separated tags applied to every engram
        #[arg(long)]
        tags: Option<String>,
    },
    /// Show knowledge base statistics
    Stats {
        /// Also count engrams matching these comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Delete every engram from the knowledge base
    Clear,
    /// Manage stored memory points
    Memories {
        #[command(subcommand)]
        action: MemoriesAction,
    },
}

#[derive(Subcommand)]
enum MemoriesAction {
    /// List memory points, newest first
    List {
        #[arg(long)]
        limit: Option<usize>,
        /// Print full summaries and image prompts
        #[arg(long)]
        full: bool,
    },
    /// Show one memory point in full
    Show { id: String },
    /// Delete one memory point
    Delete { id: String },
    /// Delete every memory point
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Mem42Config::load_from(path)?,
        None => Mem42Config::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC and CLI output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve_http(config).await?;
        }
        Command::Mcp => {
            server::serve_mcp(config).await?;
        }
        Command::Ask {
            query,
            tags,
            memory,
        } => {
            cli::ask::ask(config, &query, tags.as_deref(), memory).await?;
        }
        Command::Ingest { paths, tags } => {
            cli::ingest::ingest(config, &paths, tags.as_deref()).await?;
        }
        Command::Stats { tags } => {
            cli::stats::stats(&config, tags.as_deref()).await?;
        }
        Command::Clear => {
            cli::clear::clear(&config).await?;
        }
        Command::Memories { action } => match action {
            MemoriesAction::List { limit, full } => cli::memories::list(&config, limit, full)?,
            MemoriesAction::Show { id } => cli::memories::show(&config, &id)?,
            MemoriesAction::Delete { id } => cli::memories::delete(&config, &id)?,
            MemoriesAction::Clear => cli::memories::clear(&config)?,
        },
    }

    Ok(())
}

//! Knowledge Explorer - Main Server
//!
//! Serves the explorer API, or runs one-off tree operations from the shell.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use knowledge_explorer::{tree::GenerationOutcome, AppState, Config};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "explorer")]
#[command(about = "Infinite knowledge-tree explorer")]
struct Cli {
    /// Path to the YAML config file (default: ./config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the root nodes of the taxonomy seed
    Roots,

    /// Generate the first page of children for a node and print it
    Generate {
        /// Node id, e.g. `history`
        node_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,knowledge_explorer=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            knowledge_explorer::start_server(config).await
        }
        Commands::Roots => print_roots(config).await,
        Commands::Generate { node_id } => run_generate(config, &node_id).await,
    }
}

async fn print_roots(config: Config) -> Result<()> {
    let state = AppState::new(config)?.into_server_state()?;
    for root in state.explorer.store().roots().await {
        println!("{}\t{}\t{}", root.id, root.title, root.hook);
    }
    Ok(())
}

async fn run_generate(config: Config, node_id: &str) -> Result<()> {
    let state = AppState::new(config)?.into_server_state()?;
    let outcome = state.explorer.generate_children(node_id).await?;

    match &outcome {
        GenerationOutcome::Failed { reason } => {
            anyhow::bail!("Generation for {} failed: {}", node_id, reason)
        }
        GenerationOutcome::CacheHit => {
            tracing::info!("{} already has children", node_id);
        }
        _ => {}
    }

    let children = state.explorer.store().visible_children(node_id).await?;
    let json = serde_json::to_string_pretty(&children).context("Failed to encode children")?;
    println!("{}", json);
    Ok(())
}

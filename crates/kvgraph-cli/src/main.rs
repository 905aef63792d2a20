//! kvgraph CLI - Graph queries over a key-value record store
//!
//! Serves a demo company schema (departments, roles, employees) from the
//! configured record store and answers node and connection queries against it.
//!
//! # Usage
//!
//! ```bash
//! # Create and seed the demo tables
//! kvgraph init
//!
//! # Print the schema
//! kvgraph schema
//!
//! # Page through employees, resolving each department lazily
//! kvgraph list Employee --first 2 --fields name,department.name
//!
//! # Fetch a node by global id
//! kvgraph node RGVwYXJ0bWVudDpkMQ== --fields id,name
//! ```

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kvgraph_config::{ConfigOverrides, KvGraphConfig, LogFormat, StoreBackend};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;
mod demo;
mod progress;

/// kvgraph - Lazy graph queries over key-value records
#[derive(Parser, Debug)]
#[command(name = "kvgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Workspace directory holding `.kvgraph/`
    #[arg(long, short = 'w', global = true, env = "KVGRAPH_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to configuration file (replaces the workspace config)
    #[arg(long, short = 'c', global = true, env = "KVGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Record store backend (sqlite, memory)
    #[arg(long, global = true, env = "KVGRAPH_BACKEND", value_parser = parse_backend)]
    backend: Option<StoreBackend>,
}

fn parse_backend(s: &str) -> Result<StoreBackend, String> {
    s.parse()
        .map_err(|e: kvgraph_config::ConfigError| e.to_string())
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> ConfigOverrides {
        let log_level = if self.quiet {
            Some("error".to_string())
        } else if self.verbose {
            Some("debug".to_string())
        } else {
            None
        };
        ConfigOverrides {
            backend: self.backend,
            log_level,
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the demo tables and seed them
    Init(commands::init::InitArgs),

    /// Print the schema definition of every bound type
    Schema(commands::schema::SchemaArgs),

    /// Fetch one node by its global id
    Node(commands::node::NodeArgs),

    /// List a page of records of one type
    List(commands::list::ListArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

/// Install the global subscriber for the configured level and format
fn init_logging(config: &KvGraphConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.logging.level)
        .with_context(|| format!("Invalid log level '{}'", config.logging.level))?;
    let builder = FmtSubscriber::builder().with_env_filter(filter);

    match (&config.logging.file, config.logging.format) {
        (Some(path), format) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let builder = builder.with_writer(Mutex::new(file)).with_ansi(false);
            match format {
                LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
                LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
            }
        }
        (None, LogFormat::Json) => tracing::subscriber::set_global_default(
            builder.with_writer(std::io::stderr).json().finish(),
        )?,
        (None, LogFormat::Text) => tracing::subscriber::set_global_default(
            builder.with_writer(std::io::stderr).with_ansi(true).finish(),
        )?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let workspace = commands::resolve_workspace(&cli.global)?;
    let config = commands::load_config(&cli.global, &workspace)?;
    init_logging(&config)?;

    match cli.command {
        Commands::Init(args) => commands::init::execute(args, cli.global, &workspace, &config).await,
        Commands::Schema(args) => commands::schema::execute(args, &config),
        Commands::Node(args) => commands::node::execute(args, &workspace, &config).await,
        Commands::List(args) => commands::list::execute(args, &workspace, &config).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global, &workspace, &config),
    }
}

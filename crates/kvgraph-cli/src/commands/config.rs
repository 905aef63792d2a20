//! Config command - View and initialize configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use kvgraph_config::KvGraphConfig;
use serde::Serialize;

use super::config_loader;
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show(ShowArgs),

    /// Write a default configuration file
    Init(InitArgs),
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the init command
#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Write ~/.kvgraph/config.toml instead of the workspace config
    #[arg(long)]
    global: bool,
}

/// Configuration file locations
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    pub global: Option<PathBuf>,
    pub local: PathBuf,
    pub database: PathBuf,
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    paths: ConfigPaths,
    config: &'a KvGraphConfig,
}

/// Execute the config command
pub fn execute(
    cmd: ConfigCommand,
    global: GlobalOptions,
    workspace: &Path,
    config: &KvGraphConfig,
) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, &global, workspace, config),
        ConfigCommand::Init(args) => execute_init(args, &global, workspace),
    }
}

fn execute_show(
    args: ShowArgs,
    global: &GlobalOptions,
    workspace: &Path,
    config: &KvGraphConfig,
) -> Result<()> {
    let loader = config_loader(global);
    let paths = ConfigPaths {
        global: loader.global_config_path(),
        local: loader.local_config_path(workspace),
        database: config.database_path(workspace),
    };

    if args.json {
        let output = ShowOutput { paths, config };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# Global: {}", describe(paths.global.as_deref()));
    println!("# Local:  {}", describe(Some(&paths.local)));
    println!("# Store:  {}", paths.database.display());
    println!();
    print!(
        "{}",
        toml::to_string_pretty(config).context("Failed to render configuration")?
    );
    Ok(())
}

fn execute_init(args: InitArgs, global: &GlobalOptions, workspace: &Path) -> Result<()> {
    let loader = config_loader(global);
    let path = if args.global {
        loader.init_global()?
    } else {
        loader.init_local(workspace)?
    };
    println!("{}", path.display());
    Ok(())
}

fn describe(path: Option<&Path>) -> String {
    match path {
        Some(path) if path.exists() => path.display().to_string(),
        Some(path) => format!("{} (not found)", path.display()),
        None => "(no home directory)".to_string(),
    }
}

//! Initialize command - Create and seed the demo tables

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use kvgraph_config::{KvGraphConfig, StoreBackend};

use super::{config_loader, open_store, print_info};
use crate::demo;
use crate::progress::{finish_progress, finish_spinner, progress_bar, spinner};
use crate::GlobalOptions;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Drop and recreate the tables if they already exist
    #[arg(long, short = 'f')]
    force: bool,

    /// Seed this many additional salaried employees
    #[arg(long, default_value = "0")]
    extra_employees: usize,
}

/// Execute the init command
pub async fn execute(
    args: InitArgs,
    global: GlobalOptions,
    workspace: &Path,
    config: &KvGraphConfig,
) -> Result<()> {
    let quiet = global.quiet;

    if config.storage.backend == StoreBackend::Memory {
        print_info(
            "The memory backend is seeded on every run; nothing to initialize.",
            quiet,
        );
        return Ok(());
    }

    let store = open_store(config, workspace).await?;
    if demo::is_initialized(store.as_ref()).await? {
        if !args.force {
            anyhow::bail!(
                "Store already initialized at {}. Use --force to reinitialize.",
                config.database_path(workspace).display()
            );
        }
        demo::reset(store.as_ref())
            .await
            .context("Failed to drop existing tables")?;
        print_info("Dropped existing tables", quiet);
    }

    let (pb, bar) = if args.extra_employees > 0 {
        let bar = progress_bar(args.extra_employees as u64, "Seeding employees", quiet);
        (None, bar)
    } else {
        (spinner("Seeding demo records...", quiet), None)
    };

    let stats = demo::seed(store.as_ref(), args.extra_employees, bar.as_ref())
        .await
        .context("Failed to seed demo records")?;
    finish_progress(bar);

    let summary = format!(
        "Seeded {} departments, {} roles and {} employees",
        stats.departments, stats.roles, stats.employees
    );
    match pb {
        Some(pb) => finish_spinner(Some(pb), &summary),
        None => print_info(&summary, quiet),
    }

    let config_path = config_loader(&global)
        .init_local(workspace)
        .context("Failed to write local config")?;
    print_info(&format!("Config at {}", config_path.display()), quiet);

    if !quiet {
        println!("\nStore initialized successfully!");
        println!("\nNext steps:");
        println!("  kvgraph schema                         - Print the schema");
        println!("  kvgraph list Employee --fields name    - List employees");
    }

    Ok(())
}

//! CLI command implementations

pub mod config;
pub mod init;
pub mod list;
pub mod node;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use kvgraph_config::{ConfigLoader, KvGraphConfig, StoreBackend};
use kvgraph_core::{MemoryStore, RecordStore, SqliteStore};
use tracing::{debug, info};

use crate::{demo, GlobalOptions};

/// Resolve the workspace path from options or current directory.
pub fn resolve_workspace(global: &GlobalOptions) -> Result<PathBuf> {
    match global.workspace {
        Some(ref path) => path
            .canonicalize()
            .with_context(|| format!("Workspace not found: {}", path.display())),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

/// Create a config loader honoring `--config`.
pub fn config_loader(global: &GlobalOptions) -> ConfigLoader {
    match global.config {
        Some(ref path) => ConfigLoader::new().with_config_file(path),
        None => ConfigLoader::new(),
    }
}

/// Load the merged configuration with CLI overrides applied.
pub fn load_config(global: &GlobalOptions, workspace: &Path) -> Result<KvGraphConfig> {
    config_loader(global)
        .load(workspace, Some(&global.to_config_overrides()))
        .context("Failed to load configuration")
}

/// Open the configured record store.
///
/// The memory backend holds no data between runs, so it is seeded on open.
pub async fn open_store(config: &KvGraphConfig, workspace: &Path) -> Result<Arc<dyn RecordStore>> {
    match config.storage.backend {
        StoreBackend::Sqlite => {
            let path = config.database_path(workspace);
            debug!("Opening SQLite store at {}", path.display());
            let store = SqliteStore::open(&path)
                .with_context(|| format!("Failed to open store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            let store = MemoryStore::new();
            let stats = demo::seed(&store, 0, None).await?;
            info!(
                "Seeded in-memory store with {} employees",
                stats.employees
            );
            Ok(Arc::new(store))
        }
    }
}

/// Open the configured store and make sure the demo tables exist.
pub async fn open_initialized_store(
    config: &KvGraphConfig,
    workspace: &Path,
) -> Result<Arc<dyn RecordStore>> {
    let store = open_store(config, workspace).await?;
    if !demo::is_initialized(store.as_ref()).await? {
        anyhow::bail!("Store is not initialized. Run `kvgraph init` first.");
    }
    Ok(store)
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}

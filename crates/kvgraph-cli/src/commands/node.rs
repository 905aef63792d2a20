//! Node command - Fetch one record by its global id

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use kvgraph_config::KvGraphConfig;
use kvgraph_core::{from_global_id, Selection};

use super::open_initialized_store;
use crate::demo;

/// Arguments for the node command
#[derive(Args, Debug)]
pub struct NodeArgs {
    /// Global id of the node (base64 of `Type:id`)
    id: String,

    /// Fields to print, comma separated (`name,department.name`)
    #[arg(long, short = 'f')]
    fields: Option<String>,
}

/// Execute the node command
pub async fn execute(args: NodeArgs, workspace: &Path, config: &KvGraphConfig) -> Result<()> {
    let (type_name, id) = from_global_id(&args.id)
        .ok_or_else(|| anyhow::anyhow!("'{}' is not a valid global id", args.id))?;

    let context = demo::schema(config)?;
    let bound = context
        .types()
        .by_type_name(&type_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown type '{}'", type_name))?;
    if !bound.implements_node() {
        anyhow::bail!("Type '{}' is not a node type", type_name);
    }

    let store = open_initialized_store(config, workspace).await?;
    let record = bound
        .by_id(store.as_ref(), &id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No {} with id '{}'", type_name, id))?;

    let selection = Selection::parse(args.fields.as_deref().unwrap_or(""));
    let rendered = context
        .render(&store, &bound, &record, &selection)
        .await
        .context("Failed to resolve fields")?;
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

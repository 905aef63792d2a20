//! List command - Print one connection page of a type

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use kvgraph_config::KvGraphConfig;
use kvgraph_core::{AttributeKind, AttributeValue, PageRequest, RecordType, ScanFilter, Selection};

use super::open_initialized_store;
use crate::demo;

/// Arguments for the list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Type to list (e.g. Employee, SalaryEmployee, Department)
    type_name: String,

    /// Page size
    #[arg(long)]
    first: Option<usize>,

    /// Cursor of the last edge of the previous page
    #[arg(long)]
    after: Option<String>,

    /// Node fields to print, comma separated (`name,department.name`)
    #[arg(long, short = 'f')]
    fields: Option<String>,

    /// Only list records with `attr=value` (repeatable)
    #[arg(long = "where", value_name = "ATTR=VALUE")]
    conditions: Vec<String>,
}

/// Execute the list command
pub async fn execute(args: ListArgs, workspace: &Path, config: &KvGraphConfig) -> Result<()> {
    let context = demo::schema(config)?;
    let bound = context
        .types()
        .by_type_name(&args.type_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown type '{}'", args.type_name))?;
    let field = context.connection_field(bound.record_type().name())?;

    let mut request = PageRequest::new().filter(parse_filter(bound.record_type(), &args.conditions)?);
    request.first = args.first;
    request.after = args.after;

    let store = open_initialized_store(config, workspace).await?;
    let page = field.resolve(store.as_ref(), &request).await?;

    let selection = Selection::parse(args.fields.as_deref().unwrap_or(""));
    let rendered = context
        .render_connection(&store, &bound, &page, &selection)
        .await
        .context("Failed to resolve fields")?;
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

/// Build a scan filter from `attr=value` conditions
///
/// Values are read in the attribute's declared kind; relationship attributes
/// compare against the related key.
fn parse_filter(record_type: &RecordType, conditions: &[String]) -> Result<ScanFilter> {
    let mut filter = ScanFilter::new();
    for condition in conditions {
        let (name, raw) = condition
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected ATTR=VALUE, got '{}'", condition))?;
        let attribute = record_type.get_attribute(name.trim()).ok_or_else(|| {
            anyhow::anyhow!("{} has no attribute '{}'", record_type.name(), name.trim())
        })?;

        let value = match &attribute.kind {
            AttributeKind::Number => AttributeValue::int(
                raw.parse()
                    .with_context(|| format!("'{}' expects an integer", attribute.name))?,
            ),
            AttributeKind::Boolean => AttributeValue::Bool(
                raw.parse()
                    .with_context(|| format!("'{}' expects true or false", attribute.name))?,
            ),
            AttributeKind::String | AttributeKind::Relationship(_) => AttributeValue::from(raw),
            other => anyhow::bail!(
                "Filtering on {} attribute '{}' is not supported",
                other,
                attribute.name
            ),
        };
        filter = filter.eq(attribute.name.clone(), value);
    }
    Ok(filter)
}

//! Schema command - Print the schema definition

use anyhow::Result;
use clap::Args;
use kvgraph_config::KvGraphConfig;

use crate::demo;

/// Arguments for the schema command
#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Print only this type (and its connection types)
    #[arg(long = "type", short = 't')]
    type_name: Option<String>,
}

/// Execute the schema command
pub fn execute(args: SchemaArgs, config: &KvGraphConfig) -> Result<()> {
    let context = demo::schema(config)?;

    match args.type_name {
        Some(name) => {
            let bound = context
                .types()
                .by_type_name(&name)
                .ok_or_else(|| anyhow::anyhow!("Unknown type '{}'", name))?;
            print!("{}", bound.to_sdl());
        }
        None => print!("{}", context.sdl()),
    }
    Ok(())
}

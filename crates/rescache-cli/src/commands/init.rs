//! Init command

use crate::app::OutputFormat;
use crate::Context;
use anyhow::Result;

pub fn run(ctx: &Context, format: OutputFormat) -> Result<()> {
    let info = ctx.db.schema_info()?;
    let types = ctx.db.resource_types()?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "cache_dir": ctx.cache_dir,
            "schema": info,
            "resource_types": types,
        })),
        OutputFormat::Cli => {
            println!("Cache ready at {}", ctx.cache_dir.display());
            if let Some(info) = info {
                println!("Schema version:  {}", info.schema_version);
                println!("Created:         {}", info.created_at);
            }
            println!("Resource types:  {}", types.join(", "));
            Ok(())
        }
    }
}

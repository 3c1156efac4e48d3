//! Status command

use crate::app::OutputFormat;
use crate::Context;
use anyhow::Result;

pub fn run(ctx: &Context, format: OutputFormat) -> Result<()> {
    let stats = ctx.db.get_stats()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        OutputFormat::Cli => {
            println!("Cache:           {}", ctx.cache_dir.display());
            println!("Storages:        {}", stats.storage_count);
            println!("Resources:       {}", stats.resource_count);
            println!();
            println!("Versions:");
            println!("  Total:         {}", stats.version_count);
            println!("  Deleted:       {}", stats.deleted_count);
            println!();
            println!("Tags:");
            println!("  Tags:          {}", stats.tag_count);
            println!("  Tagged:        {}", stats.link_count);
        }
    }
    Ok(())
}

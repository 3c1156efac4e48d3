//! Resource listing commands

use crate::app::{LsArgs, OutputFormat, VersionsArgs};
use crate::Context;
use anyhow::Result;
use rescache_core::ResCacheError;

fn check_type(ctx: &Context, resource_type: &str) -> Result<()> {
    if !ctx.db.resource_types()?.iter().any(|t| t == resource_type) {
        return Err(ResCacheError::UnknownResourceType(resource_type.to_string()).into());
    }
    Ok(())
}

pub fn run(args: LsArgs, ctx: &Context, format: OutputFormat) -> Result<()> {
    check_type(ctx, &args.resource_type)?;
    let resources = ctx.db.latest_resources(&args.resource_type)?;

    match format {
        OutputFormat::Json => super::print_json(&resources)?,
        OutputFormat::Cli => {
            if resources.is_empty() {
                println!("No {}", args.resource_type);
            }
            for resource in resources {
                let tags: Vec<String> = ctx
                    .db
                    .tags_for_resource(resource.id)?
                    .into_iter()
                    .map(|t| t.name)
                    .collect();
                print!(
                    "{} (v{}) {}",
                    resource.filename, resource.version, resource.storage_location
                );
                if !tags.is_empty() {
                    print!(" [{}]", tags.join(", "));
                }
                println!();
            }
        }
    }
    Ok(())
}

pub fn versions(args: VersionsArgs, ctx: &Context, format: OutputFormat) -> Result<()> {
    check_type(ctx, &args.resource_type)?;
    let id = ctx
        .db
        .resource_id_for_resource(&args.filename, &args.resource_type)?
        .ok_or_else(|| {
            ResCacheError::ResourceNotFound(format!("{}/{}", args.resource_type, args.filename))
        })?;
    let versions = ctx.db.resource_versions(id)?;

    match format {
        OutputFormat::Json => super::print_json(&versions)?,
        OutputFormat::Cli => {
            for version in versions {
                println!(
                    "v{}  {}  {}  {}{}",
                    version.version,
                    version.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    &version.checksum[..12.min(version.checksum.len())],
                    version.storage_location,
                    if version.deleted { " (deleted)" } else { "" }
                );
            }
        }
    }
    Ok(())
}

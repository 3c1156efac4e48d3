//! Storage management commands

use crate::app::{AddArgs, OutputFormat, RemoveArgs};
use crate::Context;
use anyhow::{Context as _, Result};
use rescache_core::{ResCacheError, StorageConfig};

pub fn add(args: AddArgs, ctx: &mut Context, format: OutputFormat) -> Result<()> {
    let path = args
        .path
        .canonicalize()
        .with_context(|| format!("Storage {} does not exist", args.path.display()))?;

    let mut storage_config = StorageConfig::detect(&path);
    storage_config.pre_installed = args.pre_installed;

    let registry = ctx.config.registry()?;
    let storage = storage_config.open(&registry);
    let report = ctx.db.synchronize_storage(storage.as_ref())?;
    if args.pre_installed {
        ctx.db.set_pre_installed(&report.location, true)?;
    }

    if ctx.config.add_storage(storage_config) {
        ctx.config.save_to(&ctx.config_path)?;
    }

    match format {
        OutputFormat::Json => super::print_json(&report)?,
        OutputFormat::Cli => {
            println!("Added storage {}", report.location);
            super::sync::print_report(&report);
        }
    }
    Ok(())
}

pub fn remove(args: RemoveArgs, ctx: &mut Context) -> Result<()> {
    let mut candidates = vec![args.path.clone()];
    if let Ok(canonical) = args.path.canonicalize() {
        candidates.push(canonical);
    }

    let mut removed = false;
    for candidate in &candidates {
        removed |= ctx
            .db
            .delete_storage_at(&candidate.to_string_lossy())?;
        if ctx.config.remove_storage(candidate) {
            ctx.config.save_to(&ctx.config_path)?;
            removed = true;
        }
    }

    if !removed {
        return Err(ResCacheError::StorageNotFound(args.path.display().to_string()).into());
    }
    println!("Removed storage {}", args.path.display());
    Ok(())
}

pub fn list(ctx: &Context, format: OutputFormat) -> Result<()> {
    let storages = ctx.db.list_storages()?;

    match format {
        OutputFormat::Json => super::print_json(&storages)?,
        OutputFormat::Cli => {
            if storages.is_empty() {
                println!("No storages");
            }
            for storage in storages {
                println!(
                    "{} [{}] {} resources, modified {}{}",
                    storage.location,
                    storage.origin_type,
                    storage.resource_count,
                    storage.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    if storage.pre_installed { " (pre-installed)" } else { "" }
                );
            }
        }
    }
    Ok(())
}

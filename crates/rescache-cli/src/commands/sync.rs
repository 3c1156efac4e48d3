//! Sync command

use crate::app::OutputFormat;
use crate::Context;
use anyhow::Result;
use rescache_core::SyncReport;

pub fn run(ctx: &Context, format: OutputFormat) -> Result<()> {
    let registry = ctx.config.registry()?;
    let mut reports = Vec::new();
    let mut failed = Vec::new();
    let mut live = Vec::new();

    for storage_config in &ctx.config.storages {
        if !storage_config.location.exists() {
            tracing::warn!(
                "Storage {} does not exist anymore",
                storage_config.location.display()
            );
            continue;
        }
        live.push(storage_config.key());

        let storage = storage_config.open(&registry);
        match ctx.db.synchronize_storage(storage.as_ref()) {
            Ok(report) => {
                if storage_config.pre_installed {
                    ctx.db.set_pre_installed(&report.location, true)?;
                }
                reports.push(report);
            }
            Err(e) => {
                tracing::warn!("Could not synchronize {}: {}", storage.location(), e);
                failed.push(storage.location().to_string());
            }
        }
    }

    let pruned = ctx.db.prune_storages(&live)?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "storages": reports,
            "failed": failed,
            "pruned": pruned,
        }))?,
        OutputFormat::Cli => {
            if reports.is_empty() && failed.is_empty() {
                println!("No storages configured");
            }
            for report in &reports {
                print_report(report);
            }
            for location in &failed {
                println!("{}: failed", location);
            }
            if pruned > 0 {
                println!("Pruned {} removed storages", pruned);
            }
        }
    }
    Ok(())
}

/// One line summary of a synchronized storage
pub(crate) fn print_report(report: &SyncReport) {
    let mut line = format!(
        "{} [{}]: {:?}, {} new, {} updated, {} unchanged",
        report.location,
        report.origin_type,
        report.action,
        report.resources.created,
        report.resources.versioned,
        report.resources.unchanged
    );
    if report.resources.skipped > 0 {
        line.push_str(&format!(", {} skipped", report.resources.skipped));
    }
    if report.missing > 0 {
        line.push_str(&format!(", {} missing", report.missing));
    }
    if report.tags.tags_added > 0 || report.tags.links_added > 0 {
        line.push_str(&format!(
            ", {} tags, {} tagged",
            report.tags.tags_added, report.tags.links_added
        ));
    }
    println!("{}", line);
}

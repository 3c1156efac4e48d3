//! Integration tests for synchronizing real folder and bundle storages

use rescache_core::db::{SyncAction, TABLES};
use rescache_core::{BundleStorage, Database, FolderStorage, ResourceTypeRegistry};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn set_mtime(path: &Path, seconds: u64) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(seconds))
        .unwrap();
}

fn write_file(path: &Path, content: &str, seconds: u64) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
    set_mtime(path, seconds);
}

fn write_bundle(path: &Path, files: &[(&str, &str)], seconds: u64) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, content) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    set_mtime(path, seconds);
}

#[test]
fn test_fresh_cache_directory() {
    let temp = TempDir::new().unwrap();
    let db = Database::initialize(temp.path(), &ResourceTypeRegistry::with_defaults()).unwrap();

    let tables = db.table_names().unwrap();
    assert_eq!(tables.len(), TABLES.len());
    assert_eq!(db.get_stats().unwrap().storage_count, 0);
    assert_eq!(
        db.schema_info().unwrap().unwrap().schema_version,
        rescache_core::db::SCHEMA_VERSION
    );
}

#[test]
fn test_folder_resource_gets_new_version_when_modified() {
    let cache = TempDir::new().unwrap();
    let resources = TempDir::new().unwrap();
    let registry = ResourceTypeRegistry::with_defaults();
    let db = Database::initialize(cache.path(), &registry).unwrap();

    let brush = resources.path().join("brushes").join("soft.gbr");
    write_file(&brush, "first", 1_000);
    let folder = FolderStorage::new(resources.path(), registry.clone());

    let report = db.synchronize_storage(&folder).unwrap();
    assert_eq!(report.action, SyncAction::Scanned);
    assert_eq!(report.resources.created, 1);

    let id = db
        .resource_id_for_resource("soft.gbr", "brushes")
        .unwrap()
        .unwrap();
    let versions = db.resource_versions(id).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version, 1);
    assert_eq!(versions[0].location, "brushes/soft.gbr");

    // same file, nothing changes
    let report = db.synchronize_storage(&folder).unwrap();
    assert_eq!(report.resources.unchanged, 1);
    assert_eq!(db.resource_versions(id).unwrap().len(), 1);

    write_file(&brush, "second", 2_000);
    let report = db.synchronize_storage(&folder).unwrap();
    assert_eq!(report.resources.versioned, 1);

    assert_eq!(
        db.resource_id_for_resource("soft.gbr", "brushes").unwrap(),
        Some(id)
    );
    let versions = db.resource_versions(id).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[1].version, 2);
    assert_ne!(versions[0].checksum, versions[1].checksum);

    let latest = db.get_resource(id).unwrap().unwrap();
    assert_eq!(latest.version, 2);
    assert_eq!(latest.checksum, versions[1].checksum);
}

#[test]
fn test_folder_tags_are_linked() {
    let cache = TempDir::new().unwrap();
    let resources = TempDir::new().unwrap();
    let registry = ResourceTypeRegistry::with_defaults();
    let db = Database::initialize(cache.path(), &registry).unwrap();

    write_file(&resources.path().join("paintoppresets/wet.kpp"), "wet", 10);
    write_file(&resources.path().join("paintoppresets/dry.kpp"), "dry", 10);
    write_file(
        &resources.path().join("tags/paintoppresets/wet_media.yml"),
        "name: Wet Media\ncomment: Watercolor and ink\ndefault_resources: [wet.kpp, missing.kpp]\n",
        10,
    );

    let folder = FolderStorage::new(resources.path(), registry);
    let report = db.synchronize_storage(&folder).unwrap();
    assert_eq!(report.tags.tags_added, 1);
    assert_eq!(report.tags.links_added, 1);
    assert_eq!(report.tags.skipped, 1);

    let tagged = db.resources_for_tag("wet_media", "paintoppresets").unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].filename, "wet.kpp");

    let tags = db.tags_for_resource(tagged[0].id).unwrap();
    assert_eq!(tags[0].name, "Wet Media");
    assert_eq!(tags[0].comment.as_deref(), Some("Watercolor and ink"));

    // a second pass adds nothing
    let report = db.synchronize_storage(&folder).unwrap();
    assert_eq!(report.tags.tags_added, 0);
    assert_eq!(report.tags.links_added, 0);
    assert_eq!(db.get_stats().unwrap().link_count, 1);
}

#[test]
fn test_removed_folder_file_is_flagged_deleted() {
    let cache = TempDir::new().unwrap();
    let resources = TempDir::new().unwrap();
    let registry = ResourceTypeRegistry::with_defaults();
    let db = Database::initialize(cache.path(), &registry).unwrap();

    let keep = resources.path().join("palettes/warm.gpl");
    let drop = resources.path().join("palettes/cold.gpl");
    write_file(&keep, "warm", 10);
    write_file(&drop, "cold", 10);

    let folder = FolderStorage::new(resources.path(), registry);
    db.synchronize_storage(&folder).unwrap();
    assert_eq!(db.latest_resources("palettes").unwrap().len(), 2);

    fs::remove_file(&drop).unwrap();
    let report = db.synchronize_storage(&folder).unwrap();
    assert_eq!(report.missing, 1);

    let listed = db.latest_resources("palettes").unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].filename, "warm.gpl");
    assert_eq!(db.get_stats().unwrap().deleted_count, 1);
}

#[test]
fn test_unchanged_bundle_is_not_reindexed() {
    let cache = TempDir::new().unwrap();
    let resources = TempDir::new().unwrap();
    let registry = ResourceTypeRegistry::with_defaults();
    let db = Database::initialize(cache.path(), &registry).unwrap();

    let path = resources.path().join("inks.bundle");
    write_bundle(
        &path,
        &[
            ("paintoppresets/ink.kpp", "ink v1"),
            ("brushes/nib.gbr", "nib"),
        ],
        5_000,
    );
    let bundle = BundleStorage::new(&path, registry.clone());

    let report = db.synchronize_storage(&bundle).unwrap();
    assert_eq!(report.action, SyncAction::Added);
    assert_eq!(report.resources.created, 2);
    let storage = db.get_storage(&path.to_string_lossy()).unwrap().unwrap();
    assert_eq!(storage.resource_count, 2);

    let report = db.synchronize_storage(&bundle).unwrap();
    assert_eq!(report.action, SyncAction::Unchanged);
    assert_eq!(report.resources.created + report.resources.unchanged, 0);
    let again = db.get_storage(&path.to_string_lossy()).unwrap().unwrap();
    assert_eq!(again.id, storage.id);
    assert_eq!(db.get_stats().unwrap().version_count, 2);

    write_bundle(&path, &[("paintoppresets/ink.kpp", "ink v2")], 6_000);
    let report = db.synchronize_storage(&bundle).unwrap();
    assert_eq!(report.action, SyncAction::Reindexed);
    assert_eq!(report.resources.created, 1);
    assert_eq!(db.resource_id_for_resource("nib.gbr", "brushes").unwrap(), None);
    assert_eq!(db.get_stats().unwrap().resource_count, 1);
}

#[test]
fn test_unreadable_bundle_is_retried() {
    let cache = TempDir::new().unwrap();
    let resources = TempDir::new().unwrap();
    let registry = ResourceTypeRegistry::with_defaults();
    let db = Database::initialize(cache.path(), &registry).unwrap();

    let path = resources.path().join("broken.bundle");
    fs::write(&path, "not a zip").unwrap();
    let bundle = BundleStorage::new(&path, registry);

    assert!(db.synchronize_storage(&bundle).is_err());
    assert!(db.get_storage(&path.to_string_lossy()).unwrap().is_none());
}

#[test]
fn test_delete_bundle_keeps_folder_resources() {
    let cache = TempDir::new().unwrap();
    let resources = TempDir::new().unwrap();
    let registry = ResourceTypeRegistry::with_defaults();
    let db = Database::initialize(cache.path(), &registry).unwrap();

    let folder_root = resources.path().join("user");
    write_file(&folder_root.join("patterns/dots.pat"), "dots", 10);
    let folder = FolderStorage::new(&folder_root, registry.clone());

    let path = resources.path().join("extra.zip");
    write_bundle(
        &path,
        &[
            ("patterns/stripes.pat", "stripes"),
            ("tags/patterns/lines.yml", "default_resources: [stripes.pat]\n"),
        ],
        20,
    );
    let bundle = BundleStorage::new(&path, registry);

    db.synchronize_storage(&folder).unwrap();
    db.synchronize_storage(&bundle).unwrap();
    assert_eq!(db.get_stats().unwrap().resource_count, 2);
    assert_eq!(db.get_stats().unwrap().link_count, 1);

    assert!(db.delete_storage(&bundle).unwrap());
    let stats = db.get_stats().unwrap();
    assert_eq!(stats.storage_count, 1);
    assert_eq!(stats.resource_count, 1);
    assert_eq!(stats.link_count, 0);
    assert!(db
        .resource_id_for_resource("dots.pat", "patterns")
        .unwrap()
        .is_some());
    assert!(!db.delete_storage(&bundle).unwrap());
}

#[test]
fn test_reindexed_bundle_keeps_shared_resource() {
    let cache = TempDir::new().unwrap();
    let resources = TempDir::new().unwrap();
    let registry = ResourceTypeRegistry::with_defaults();
    let db = Database::initialize(cache.path(), &registry).unwrap();

    let a_path = resources.path().join("a.bundle");
    let b_path = resources.path().join("b.bundle");
    write_bundle(&a_path, &[("brushes/shared.gbr", "from a")], 10);
    write_bundle(
        &b_path,
        &[("brushes/shared.gbr", "from b"), ("brushes/only_b.gbr", "b")],
        20,
    );
    let a = BundleStorage::new(&a_path, registry.clone());
    let b = BundleStorage::new(&b_path, registry);
    db.synchronize_storage(&a).unwrap();
    db.synchronize_storage(&b).unwrap();

    write_bundle(&a_path, &[("brushes/shared.gbr", "from a, updated")], 15);
    let report = db.synchronize_storage(&a).unwrap();
    assert_eq!(report.action, SyncAction::Reindexed);
    assert_eq!(report.resources.created, 1);
    assert_eq!(report.resources.unchanged, 0);

    let location = a_path.to_string_lossy().to_string();
    assert_eq!(db.get_storage(&location).unwrap().unwrap().resource_count, 1);
    let id = db
        .resource_id_for_resource("shared.gbr", "brushes")
        .unwrap()
        .unwrap();
    let versions = db.resource_versions(id).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version, 1);
    assert_eq!(versions[0].storage_location, location);

    assert!(db.delete_storage(&b).unwrap());
    assert!(db
        .resource_id_for_resource("shared.gbr", "brushes")
        .unwrap()
        .is_some());
    assert_eq!(db.resource_id_for_resource("only_b.gbr", "brushes").unwrap(), None);
}

#[test]
fn test_prune_removes_unconfigured_storages() {
    let cache = TempDir::new().unwrap();
    let resources = TempDir::new().unwrap();
    let registry = ResourceTypeRegistry::with_defaults();
    let db = Database::initialize(cache.path(), &registry).unwrap();

    let a = resources.path().join("a");
    let b = resources.path().join("b");
    write_file(&a.join("workspaces/paint.kws"), "paint", 10);
    write_file(&b.join("workspaces/sketch.kws"), "sketch", 10);
    db.synchronize_storage(&FolderStorage::new(&a, registry.clone()))
        .unwrap();
    db.synchronize_storage(&FolderStorage::new(&b, registry))
        .unwrap();

    let pruned = db
        .prune_storages(&[a.to_string_lossy().to_string()])
        .unwrap();
    assert_eq!(pruned, 1);
    let names: Vec<String> = db
        .latest_resources("workspaces")
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["paint".to_string()]);
}

#[test]
fn test_cache_survives_reopen() {
    let cache = TempDir::new().unwrap();
    let resources = TempDir::new().unwrap();
    let registry = ResourceTypeRegistry::with_defaults();

    write_file(&resources.path().join("gradients/dusk.ggr"), "dusk", 10);
    {
        let db = Database::initialize(cache.path(), &registry).unwrap();
        db.synchronize_storage(&FolderStorage::new(resources.path(), registry.clone()))
            .unwrap();
    }

    let db = Database::initialize(cache.path(), &registry).unwrap();
    let listed = db.latest_resources("gradients").unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "dusk");
}

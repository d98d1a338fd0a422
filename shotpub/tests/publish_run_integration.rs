//! Integration tests for the publish engine.
//!
//! These tests verify the complete flow including:
//! - collect → accept → validate → publish → finalize over real files
//! - environment-driven path templates and publish locations
//! - frame-sequence collection and expansion
//! - conflict detection across consecutive runs
//! - tree persistence between sessions
//!
//! Run with: `cargo test --test publish_run_integration`

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use shotpub::engine::{
    EnvironmentSettings, PassKind, PublishManager, RunOptions,
};
use shotpub::plugin::{FileCollector, FilePublishPlugin};
use shotpub::settings::{TemplateRegistry, Value};
use shotpub::tracking::{MemoryTracking, TrackingService};
use shotpub::tree::{Context, PublishTree, TaskStatus};

// ============================================================================
// Helper Functions
// ============================================================================

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"data").unwrap();
}

/// Template registry with a publish pattern rooted in the given folder.
fn templates(publish_root: &Path) -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();
    registry.insert(
        "publish_file",
        format!(
            "{}/{{shot}}/{{name}}.v{{version:03}}.{{ext}}",
            publish_root.display()
        ),
    );
    registry
}

/// Environment routing the file publish plugin through the path template.
fn environment() -> EnvironmentSettings {
    let mut environment = EnvironmentSettings::new();
    let overrides: BTreeMap<String, Value> = [(
        "publish_path_template".to_string(),
        Value::from("publish_file"),
    )]
    .into();
    environment.set_overrides("*", "publish-file", overrides);
    environment
}

fn manager(publish_root: &Path) -> PublishManager {
    let mut manager = PublishManager::new(
        Box::new(FileCollector::new()),
        Box::new(MemoryTracking::new()),
    )
    .with_templates(templates(publish_root))
    .with_environment(environment())
    .with_default_context(Context::new("shotA").with_field("shot", "shotA"));
    manager.register_plugin(Box::new(FilePublishPlugin::new()));
    manager
}

// ============================================================================
// Integration Tests
// ============================================================================

#[test]
fn test_full_run_publishes_to_template_location() {
    let work = tempfile::tempdir().unwrap();
    let publish_root = tempfile::tempdir().unwrap();
    let source = work.path().join("scene.v003.ma");
    touch(&source);

    let mut manager = manager(publish_root.path());
    manager.collect_files(&[source.clone()]).unwrap();
    let report = manager.run(&RunOptions::default()).unwrap();

    assert!(report.is_success());
    assert_eq!(report.passes.len(), 3);

    // The file landed at the rendered template path.
    let published = publish_root.path().join("shotA/scene.v003.ma");
    assert!(published.exists());
    assert!(source.exists());

    // The artifact is registered with the stripped name and the version
    // from the work file.
    let records = manager
        .tracking()
        .find_records(&Context::new("shotA"), "scene.ma")
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].version, 3);
    assert_eq!(records[0].path, published);
    assert_eq!(records[0].artifact_type, "Maya Scene");
}

#[test]
fn test_sequence_collection_and_publish() {
    let work = tempfile::tempdir().unwrap();
    let publish_root = tempfile::tempdir().unwrap();
    for frame in 1001..=1004 {
        touch(&work.path().join(format!("beauty.{}.exr", frame)));
    }

    let mut manager = manager(publish_root.path());
    let items = manager.collect_files(&[work.path().to_path_buf()]).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(manager.tree().item(items[0]).type_tag, "file.image.sequence");

    let report = manager.run(&RunOptions::default()).unwrap();
    assert!(report.is_success());

    // The single-file template gained a frame placeholder before the
    // extension, and every frame was copied under it.
    for frame in 1001..=1004 {
        assert!(publish_root
            .path()
            .join(format!("shotA/beauty.v001.{}.exr", frame))
            .exists());
    }

    let records = manager
        .tracking()
        .find_records(&Context::new("shotA"), "beauty.####.exr")
        .unwrap();
    assert_eq!(records.len(), 1);
}

#[test]
fn test_second_version_conflicts_with_first_publish() {
    let work = tempfile::tempdir().unwrap();
    let publish_root = tempfile::tempdir().unwrap();
    let v1 = work.path().join("scene.v001.ma");
    touch(&v1);

    let mut manager = manager(publish_root.path());
    manager.collect_files(&[v1]).unwrap();
    assert!(manager.run(&RunOptions::default()).unwrap().is_success());

    // A new work version publishes under the same name, which the
    // tracking service already has a record for.
    let v2 = work.path().join("scene.v002.ma");
    touch(&v2);
    manager.collect_files(&[v2]).unwrap();

    let options = RunOptions::default().with_item_filters(vec!["scene.v002.ma".to_string()]);
    let report = manager.run(&options).unwrap();

    assert!(!report.is_success());
    let validate = report.pass(PassKind::Validate).unwrap();
    assert_eq!(validate.failures().count(), 1);
    assert!(validate
        .failures()
        .next()
        .unwrap()
        .message
        .as_deref()
        .unwrap()
        .contains("already exist"));
    // Publish never ran.
    assert!(report.pass(PassKind::Publish).is_none());
}

#[test]
fn test_tree_persists_across_sessions() {
    let work = tempfile::tempdir().unwrap();
    let publish_root = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    let tree_file = state.path().join("tree.json");
    let source = work.path().join("scene.v001.ma");
    touch(&source);

    // Session one: collect and save without executing.
    let mut first = manager(publish_root.path());
    first.collect_files(&[source]).unwrap();
    first.tree().save_file(&tree_file).unwrap();

    // Session two: load the tree and run it.
    let tree = PublishTree::load_file(&tree_file).unwrap();
    let mut second = manager(publish_root.path());
    second = second.with_tree(tree);
    let report = second.run(&RunOptions::default()).unwrap();

    assert!(report.is_success());
    assert!(publish_root.path().join("shotA/scene.v001.ma").exists());
}

#[test]
fn test_task_filter_limits_execution() {
    let work = tempfile::tempdir().unwrap();
    let publish_root = tempfile::tempdir().unwrap();
    let source = work.path().join("scene.ma");
    touch(&source);

    let mut manager = manager(publish_root.path());
    let items = manager.collect_files(&[source]).unwrap();

    let options =
        RunOptions::default().with_task_filters(vec!["No Such Task*".to_string()]);
    let report = manager.run(&options).unwrap();

    // Nothing matched, so nothing ran and nothing failed.
    assert!(report.is_success());
    assert!(report.pass(PassKind::Validate).unwrap().outcomes.is_empty());
    assert_eq!(
        manager.tree().item(items[0]).tasks()[0].status,
        TaskStatus::Pending
    );
}

#[test]
fn test_deactivated_item_is_not_published() {
    let work = tempfile::tempdir().unwrap();
    let publish_root = tempfile::tempdir().unwrap();
    let keep = work.path().join("keep.v001.ma");
    let skip = work.path().join("skip.v001.ma");
    touch(&keep);
    touch(&skip);

    let mut manager = manager(publish_root.path());
    let items = manager
        .collect_files(&[keep, skip])
        .unwrap();
    let skipped_item = items
        .iter()
        .copied()
        .find(|i| manager.tree().item(*i).name == "skip.v001.ma")
        .unwrap();
    manager.tree_mut().item_mut(skipped_item).active = false;

    let report = manager.run(&RunOptions::default()).unwrap();
    assert!(report.is_success());

    assert!(publish_root.path().join("shotA/keep.v001.ma").exists());
    assert!(!publish_root.path().join("shotA/skip.v001.ma").exists());
}

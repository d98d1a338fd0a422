//! Shared helpers for CLI commands.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use shotpub::engine::{
    CancelFlag, EnvironmentSettings, PassReport, PublishManager, RunReport,
    COLLECTOR_PLUGIN_KEY,
};
use shotpub::plugin::{FileCollector, FilePublishPlugin};
use shotpub::settings::{TemplateRegistry, Value};
use shotpub::tracking::MemoryTracking;
use shotpub::tree::{Context, PublishTree, TaskStatus};

use crate::error::CliError;

/// Environment variable naming the tree file to load and save.
pub const TREE_FILE_VAR: &str = "SHOTPUB_TREE_FILE";

/// Environment variable naming the folder scanned by session collection.
pub const PRELOAD_DIR_VAR: &str = "SHOTPUB_PRELOAD_DIR";

/// Environment variable carrying comma-separated item name filters.
pub const ITEM_FILTERS_VAR: &str = "SHOTPUB_ITEM_FILTERS";

/// Environment variable carrying comma-separated task name filters.
pub const TASK_FILTERS_VAR: &str = "SHOTPUB_TASK_FILTERS";

/// Shared configuration flags for commands that build a publish manager.
#[derive(Debug, clap::Args)]
pub struct SessionArgs {
    /// Context key the collected items publish under
    #[arg(long, default_value = "default")]
    pub context: String,

    /// Context field as name=value; repeatable
    #[arg(long = "field", value_name = "NAME=VALUE")]
    pub fields: Vec<String>,

    /// JSON file mapping template names to path patterns
    #[arg(long, value_name = "FILE")]
    pub templates: Option<PathBuf>,

    /// JSON environment settings file (context -> plugin -> overrides)
    #[arg(long, value_name = "FILE")]
    pub environment: Option<PathBuf>,

    /// Folder scanned by session collection (defaults to $SHOTPUB_PRELOAD_DIR)
    #[arg(long, value_name = "DIR")]
    pub preload_dir: Option<PathBuf>,

    /// Tree file to load before and save after (defaults to $SHOTPUB_TREE_FILE)
    #[arg(long, value_name = "FILE")]
    pub tree_file: Option<PathBuf>,
}

impl SessionArgs {
    pub fn tree_file(&self) -> Option<PathBuf> {
        self.tree_file
            .clone()
            .or_else(|| env::var(TREE_FILE_VAR).ok().map(PathBuf::from))
    }

    pub fn preload_dir(&self) -> Option<PathBuf> {
        self.preload_dir
            .clone()
            .or_else(|| env::var(PRELOAD_DIR_VAR).ok().map(PathBuf::from))
    }
}

/// Resolve filters from flags, falling back to a comma-separated
/// environment variable.
pub fn filters_or_env(flags: &[String], var: &str) -> Vec<String> {
    if !flags.is_empty() {
        return flags.to_vec();
    }
    env::var(var)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_context(args: &SessionArgs) -> Result<Context, CliError> {
    let mut context = Context::new(&args.context);
    for field in &args.fields {
        let (name, value) = field.split_once('=').ok_or_else(|| {
            CliError::Config(format!("invalid --field '{}', expected NAME=VALUE", field))
        })?;
        context = context.with_field(name, Value::from(value));
    }
    Ok(context)
}

fn load_templates(path: &Path) -> Result<TemplateRegistry, CliError> {
    let data = fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let map: BTreeMap<String, String> = serde_json::from_str(&data)
        .map_err(|e| CliError::Config(format!("invalid template file {}: {}", path.display(), e)))?;
    Ok(TemplateRegistry::from_map(map))
}

/// Build a publish manager with the built-in collector and plugins,
/// configured from the session flags.
pub fn build_manager(args: &SessionArgs, cancel: CancelFlag) -> Result<PublishManager, CliError> {
    let templates = match &args.templates {
        Some(path) => load_templates(path)?,
        None => TemplateRegistry::new(),
    };
    let mut environment = match &args.environment {
        Some(path) => EnvironmentSettings::load_file(path)?,
        None => EnvironmentSettings::new(),
    };
    if let Some(preload) = args.preload_dir() {
        environment.set_overrides(
            "*",
            COLLECTOR_PLUGIN_KEY,
            [(
                "preload_folder".to_string(),
                Value::from(preload.display().to_string()),
            )]
            .into(),
        );
    }

    let mut manager = PublishManager::new(
        Box::new(FileCollector::new()),
        Box::new(MemoryTracking::new()),
    )
    .with_templates(templates)
    .with_environment(environment)
    .with_default_context(parse_context(args)?)
    .with_cancel_flag(cancel);

    if let Some(tree_file) = args.tree_file() {
        if tree_file.exists() {
            manager = manager.with_tree(PublishTree::load_file(&tree_file)?);
        }
    }

    manager.register_plugin(Box::new(FilePublishPlugin::new()));
    Ok(manager)
}

/// Save the tree back to the session's tree file, when one is configured.
pub fn save_tree(args: &SessionArgs, manager: &PublishManager) -> Result<(), CliError> {
    if let Some(tree_file) = args.tree_file() {
        manager.tree().save_file(&tree_file)?;
        println!("Saved publish tree to {}", tree_file.display());
    }
    Ok(())
}

/// Print the item tree with task statuses.
pub fn print_tree(tree: &PublishTree) {
    if tree.is_empty() {
        println!("(empty tree)");
        return;
    }
    for item_id in tree.iter() {
        let item = tree.item(item_id);
        let indent = "  ".repeat(item_depth(tree, item_id).saturating_sub(1));
        let active = if tree.is_effectively_active(item_id) {
            ""
        } else {
            " [inactive]"
        };
        println!("{}{} <{}>{}", indent, item.name, item.type_tag, active);
        for task in item.tasks() {
            println!("{}  - {} ({})", indent, task.name, task.status);
        }
    }
}

/// Number of ancestors between an item and the tree root. Top-level
/// items sit at depth 1.
fn item_depth(tree: &PublishTree, item: shotpub::tree::ItemId) -> usize {
    let mut depth: usize = 0;
    let mut current = tree.item(item).parent();
    while let Some(parent) = current {
        depth += 1;
        current = tree.item(parent).parent();
    }
    depth
}

fn print_pass(pass: &PassReport) {
    println!("{} pass:", pass.kind);
    for outcome in &pass.outcomes {
        let marker = if outcome.is_failure() { "FAIL" } else { " ok " };
        match &outcome.message {
            Some(message) => println!(
                "  [{}] {} / {}: {} - {}",
                marker, outcome.item_name, outcome.task_name, outcome.status, message
            ),
            None => println!(
                "  [{}] {} / {}: {}",
                marker, outcome.item_name, outcome.task_name, outcome.status
            ),
        }
    }
}

/// Print the run report and convert failures into an exit error.
pub fn report_result(report: &RunReport) -> Result<(), CliError> {
    for pass in &report.passes {
        print_pass(pass);
    }
    if report.cancelled {
        println!("Run cancelled.");
    }

    let failures: usize = report
        .passes
        .iter()
        .map(|p| p.failures().count())
        .sum();
    if report.is_success() {
        let published = report
            .passes
            .iter()
            .flat_map(|p| p.outcomes.iter())
            .filter(|o| o.status == TaskStatus::Finalized)
            .count();
        println!("Publish complete: {} task(s) finalized.", published);
        Ok(())
    } else {
        Err(CliError::PublishFailed {
            failures: failures.max(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shotpub::settings::ResolvedSettings;

    #[test]
    fn test_item_depth_counts_ancestors() {
        let mut tree = PublishTree::new();
        let root = tree.root();
        let scene = tree.create_item(root, "file.scene", "scene.ma", "Scene");
        let render = tree.create_item(scene, "file.image.sequence", "render.exr", "Renders");
        tree.add_task(scene, "publish-file", "Publish File", ResolvedSettings::default(), true, true);

        assert_eq!(item_depth(&tree, scene), 1);
        assert_eq!(item_depth(&tree, render), 2);
    }

    #[test]
    fn test_filters_or_env_prefers_flags() {
        let flags = vec!["scene*".to_string()];
        assert_eq!(
            filters_or_env(&flags, "SHOTPUB_TEST_UNSET_VAR"),
            vec!["scene*".to_string()]
        );
        assert!(filters_or_env(&[], "SHOTPUB_TEST_UNSET_VAR").is_empty());
    }
}

//! Plugin interfaces.
//!
//! Two kinds of plugin drive a publish session. Collectors inspect the
//! session and the filesystem and build the item tree; publish plugins
//! attach tasks to items they accept and carry them through validate,
//! publish and finalize. The engine owns sequencing and rollback; plugins
//! only implement the per-task operations.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::fileutil::FileError;
use crate::pathutil::PathError;
use crate::settings::{ResolvedSettings, SettingsError, SettingsSchema, TemplateRegistry};
use crate::tracking::{TrackingError, TrackingService};
use crate::tree::{ItemId, PublishTree, TaskId};

mod file_collector;
mod file_publish;
mod registry;

pub use file_collector::{
    FileCollector, COLLECTED_PATH_PROPERTY, PATH_PROPERTY, SEQUENCE_PATHS_PROPERTY,
};
pub use file_publish::{
    FilePublishPlugin, COPIED_PATHS_PROPERTY, PUBLISH_NAME_PROPERTY, PUBLISH_PATH_PROPERTY,
    PUBLISH_VERSION_PROPERTY, RECORD_HANDLE_PROPERTY,
};
pub use registry::PluginRegistry;

/// A publish would overwrite existing work.
#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("{count} publish record(s) named '{name}' already exist in context {context}")]
    RecordExists {
        context: String,
        name: String,
        count: usize,
    },

    #[error("publish destination already exists on disk: {}", format_paths(.paths))]
    DestinationExists { paths: Vec<PathBuf> },
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum PluginError {
    /// A validation check failed. The message is surfaced verbatim in
    /// the run report.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error("{0}")]
    Other(String),
}

/// A plugin's verdict on one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acceptance {
    /// Whether a task should be created at all.
    pub accepted: bool,

    /// An accepted-but-disabled task exists and is visible, but a UI
    /// must not let the user activate it.
    pub enabled: bool,

    /// Whether a UI should show the task.
    pub visible: bool,

    /// Initial activation state.
    pub checked: bool,
}

impl Acceptance {
    /// Accept with the task enabled, visible and checked.
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            enabled: true,
            visible: true,
            checked: true,
        }
    }

    pub fn rejected() -> Self {
        Self {
            accepted: false,
            enabled: false,
            visible: false,
            checked: false,
        }
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Shared state handed to every plugin operation.
pub struct PluginContext<'a> {
    pub tree: &'a mut PublishTree,
    pub tracking: &'a mut dyn TrackingService,
    pub templates: &'a TemplateRegistry,
}

/// A publish plugin: accepts items and runs their tasks through the
/// three execution passes.
///
/// `undo` compensates a completed or partially-completed `publish` of the
/// same task. The engine invokes it on publish failure; implementations
/// must tolerate partial state (files copied but nothing registered, say)
/// and report rather than raise secondary failures where possible.
pub trait PublishPlugin {
    /// Stable registry identifier, e.g. `publish-file`.
    fn id(&self) -> &str;

    /// Display name used for task naming.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Glob patterns matched against item type tags. Only matching items
    /// are offered to `accept`.
    fn item_filters(&self) -> Vec<String>;

    fn settings_schema(&self) -> SettingsSchema;

    /// Inspect an item offered by the engine and decide whether to
    /// attach a task. Must not mutate external state.
    fn accept(
        &self,
        ctx: &mut PluginContext<'_>,
        item: ItemId,
        settings: &ResolvedSettings,
    ) -> Acceptance;

    fn validate(
        &self,
        ctx: &mut PluginContext<'_>,
        item: ItemId,
        task: TaskId,
    ) -> Result<(), PluginError>;

    fn publish(
        &self,
        ctx: &mut PluginContext<'_>,
        item: ItemId,
        task: TaskId,
    ) -> Result<(), PluginError>;

    fn finalize(
        &self,
        ctx: &mut PluginContext<'_>,
        item: ItemId,
        task: TaskId,
    ) -> Result<(), PluginError>;

    fn undo(
        &self,
        ctx: &mut PluginContext<'_>,
        item: ItemId,
        task: TaskId,
    ) -> Result<(), PluginError>;
}

/// A collector: builds the item tree from the session and from files.
pub trait Collector {
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new()
    }

    /// Collect items describing the current working session, parented
    /// under `parent`. Returns the top-level items created.
    fn process_current_session(
        &self,
        ctx: &mut PluginContext<'_>,
        settings: &ResolvedSettings,
        parent: ItemId,
    ) -> Result<Vec<ItemId>, PluginError>;

    /// Collect items for one dropped-in path (file or folder).
    fn process_file(
        &self,
        ctx: &mut PluginContext<'_>,
        settings: &ResolvedSettings,
        parent: ItemId,
        path: &Path,
    ) -> Result<Vec<ItemId>, PluginError>;

    /// Invoked after an item's context is reassigned so cached
    /// context-derived state can be refreshed.
    fn on_context_changed(
        &self,
        _ctx: &mut PluginContext<'_>,
        _item: ItemId,
    ) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Whether a type tag matches any of a plugin's item filters.
///
/// Filters are glob patterns over the dotted tag, so `file.image.*`
/// matches `file.image.sequence` but not `file.image` itself.
pub fn matches_item_filters(filters: &[String], type_tag: &str) -> bool {
    filters
        .iter()
        .filter_map(|f| glob::Pattern::new(f).ok())
        .any(|p| p.matches(type_tag))
}

/// Collect every path already claimed by a collected item, so repeat
/// drops of the same file do not produce duplicate items.
pub fn collected_paths(tree: &PublishTree) -> BTreeSet<PathBuf> {
    tree.iter()
        .filter_map(|id| {
            tree.item(id)
                .property(file_collector::COLLECTED_PATH_PROPERTY)
                .and_then(|v| v.as_str())
                .map(PathBuf::from)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_filter_globs() {
        let filters = vec!["file.image.*".to_string(), "file.scene".to_string()];
        assert!(matches_item_filters(&filters, "file.image.sequence"));
        assert!(matches_item_filters(&filters, "file.scene"));
        assert!(!matches_item_filters(&filters, "file.image"));
        assert!(!matches_item_filters(&filters, "file.text"));
    }

    #[test]
    fn test_acceptance_builders() {
        let acceptance = Acceptance::accepted().with_checked(false);
        assert!(acceptance.accepted);
        assert!(acceptance.enabled);
        assert!(!acceptance.checked);
        assert!(!Acceptance::rejected().accepted);
    }
}

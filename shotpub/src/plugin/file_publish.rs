//! The built-in file publish plugin.
//!
//! Validates that a collected file can be published under its context,
//! copies it to the configured publish location and registers the result
//! with the tracking service. Undo removes the copies and the record,
//! returning disk and tracking service to their pre-publish state.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::fileutil;
use crate::pathutil;
use crate::settings::{ResolvedSettings, SettingType, SettingsSchema, Value};
use crate::tracking::{ArtifactSpec, RecordHandle};
use crate::tree::{Context, ItemId, PublishTree, TaskId};

use super::file_collector::{PATH_PROPERTY, SEQUENCE_PATHS_PROPERTY};
use super::{Acceptance, ConflictError, PluginContext, PluginError, PublishPlugin};

/// Global property: the name the item publishes under.
pub const PUBLISH_NAME_PROPERTY: &str = "publish_name";

/// Global property: the version the item publishes as. Children publish
/// under their nearest versioned ancestor's version.
pub const PUBLISH_VERSION_PROPERTY: &str = "publish_version";

/// Property holding the registered record handle. Written both task-local
/// (so undo knows which registration was this task's) and global (so
/// child items can declare it a dependency).
pub const RECORD_HANDLE_PROPERTY: &str = "artifact_record_handle";

/// Task-local property: the resolved publish destination. A pattern path
/// for sequences.
pub const PUBLISH_PATH_PROPERTY: &str = "publish_path";

/// Task-local property: files this task actually wrote, excluding
/// in-place sources. Undo deletes exactly these.
pub const COPIED_PATHS_PROPERTY: &str = "copied_paths";

#[derive(Debug, Default)]
pub struct FilePublishPlugin;

impl FilePublishPlugin {
    pub fn new() -> Self {
        Self
    }

    /// The version this item publishes as: the nearest versioned
    /// ancestor's version when one exists, else the version baked into
    /// the file path, else 1.
    fn publish_version(tree: &PublishTree, item: ItemId, path: &Path) -> u32 {
        let mut current = tree.item(item).parent();
        while let Some(ancestor) = current {
            if let Some(version) = tree
                .item(ancestor)
                .property(PUBLISH_VERSION_PROPERTY)
                .and_then(|v| v.as_int())
            {
                return version as u32;
            }
            current = tree.item(ancestor).parent();
        }
        pathutil::version_number(path).unwrap_or(1)
    }

    /// Record handles registered by ancestor items, for dependency links.
    fn ancestor_handles(tree: &PublishTree, item: ItemId) -> Vec<RecordHandle> {
        let mut handles = Vec::new();
        let mut current = tree.item(item).parent();
        while let Some(ancestor) = current {
            if let Some(handle) = tree
                .item(ancestor)
                .property(RECORD_HANDLE_PROPERTY)
                .and_then(|v| v.as_int())
            {
                handles.push(RecordHandle(handle as u64));
            }
            current = tree.item(ancestor).parent();
        }
        handles
    }

    fn source_path(tree: &PublishTree, item: ItemId) -> Result<PathBuf, PluginError> {
        tree.item(item)
            .property(PATH_PROPERTY)
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .ok_or_else(|| {
                PluginError::Validation(format!(
                    "item {} has no path property",
                    tree.item(item)
                ))
            })
    }

    fn source_files(tree: &PublishTree, item: ItemId, path: &Path) -> Vec<PathBuf> {
        match tree
            .item(item)
            .property(SEQUENCE_PATHS_PROPERTY)
            .and_then(|v| v.as_list())
        {
            Some(members) => members
                .iter()
                .filter_map(|v| v.as_str())
                .map(PathBuf::from)
                .collect(),
            None => vec![path.to_path_buf()],
        }
    }

    fn is_sequence(tree: &PublishTree, item: ItemId) -> bool {
        tree.item(item).property(SEQUENCE_PATHS_PROPERTY).is_some()
    }

    /// The printf-style frame placeholder of a sequence item, with width
    /// taken from the first member's padding.
    fn frame_placeholder(tree: &PublishTree, item: ItemId, path: &Path) -> Option<String> {
        let width = Self::source_files(tree, item, path)
            .iter()
            .find_map(|p| pathutil::frame_number(p))
            .map(|frame| frame.len())?;
        Some(format!("%0{}d", width))
    }

    /// Render the publish destination from the path template setting, or
    /// fall back to publishing the file in place.
    ///
    /// Sequence items expose their placeholder as the `frame` field; when
    /// a template does not place it, the placeholder is injected before
    /// the extension so frames cannot collapse onto one destination.
    fn resolve_publish_path(
        ctx: &PluginContext<'_>,
        item: ItemId,
        task: TaskId,
        source: &Path,
        name: &str,
        version: u32,
    ) -> Result<PathBuf, PluginError> {
        let tree_item = ctx.tree.item(item);
        let setting = tree_item
            .task(task)
            .and_then(|t| t.settings.get("publish_path_template"))
            .cloned();

        let Some(setting) = setting else {
            return Ok(source.to_path_buf());
        };
        let Some(template) = setting.value().as_template() else {
            return Ok(source.to_path_buf());
        };

        let placeholder = if Self::is_sequence(ctx.tree, item) {
            Self::frame_placeholder(ctx.tree, item, source)
        } else {
            None
        };

        let mut template = template.clone();
        // Fields computed during validation override whatever the accept
        // pass pre-resolved.
        template.set_field("name", Value::from(template_name(name)));
        template.set_field("version", Value::Int(version as i64));
        if let Some(ext) = source.extension().and_then(|e| e.to_str()) {
            template.set_field("ext", Value::from(ext));
        }
        if let Some(placeholder) = &placeholder {
            template.set_field("frame", Value::from(placeholder.as_str()));
        }
        for (field, value) in tree_item.fields() {
            if !template.fields.contains_key(&field) {
                template.set_field(field, value);
            }
        }
        if let Some(context) = ctx.tree.context_for(item) {
            for (field, value) in &context.fields {
                template.set_field(field.clone(), value.clone());
            }
        }

        let Some(mut path) = template.resolve_path(ctx.templates)? else {
            return Ok(source.to_path_buf());
        };
        if let Some(placeholder) = placeholder {
            if pathutil::path_for_frame(&path, "*", None).is_none() {
                path = inject_before_extension(&path, &placeholder);
            }
        }
        Ok(path)
    }

    /// Destinations a copy publish would write, for the exists-on-disk
    /// conflict check.
    fn expanded_destinations(
        sources: &[PathBuf],
        dest: &Path,
        is_sequence: bool,
    ) -> Vec<PathBuf> {
        if !is_sequence {
            return vec![dest.to_path_buf()];
        }
        sources
            .iter()
            .filter_map(|s| pathutil::frame_number(s))
            .filter_map(|frame| pathutil::path_for_frame(dest, &frame, None))
            .collect()
    }

    fn require_context(ctx: &PluginContext<'_>, item: ItemId) -> Result<Context, PluginError> {
        ctx.tree.context_for(item).cloned().ok_or_else(|| {
            PluginError::Validation(format!(
                "item {} has no context to publish under",
                ctx.tree.item(item)
            ))
        })
    }
}

/// Insert a frame placeholder between a file name's stem and extension.
fn inject_before_extension(path: &Path, placeholder: &str) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let injected = match name.rfind('.') {
        Some(dot) => format!("{}.{}{}", &name[..dot], placeholder, &name[dot..]),
        None => format!("{}.{}", name, placeholder),
    };
    path.with_file_name(injected)
}

/// Strip extension and frame placeholder from a publish name to get the
/// bare `{name}` template field.
fn template_name(publish_name: &str) -> String {
    let mut name = publish_name;
    if let Some(dot) = name.rfind('.') {
        name = &name[..dot];
    }
    name.trim_end_matches('#').trim_end_matches('.').to_string()
}

impl PublishPlugin for FilePublishPlugin {
    fn id(&self) -> &str {
        "publish-file"
    }

    fn name(&self) -> &str {
        "Publish to Tracking Service"
    }

    fn description(&self) -> &str {
        "Copies the file to the publish location and registers it with \
         the tracking service."
    }

    fn item_filters(&self) -> Vec<String> {
        vec!["file".to_string(), "file.*".to_string()]
    }

    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new()
            .with_setting(
                "publish_type",
                SettingType::Str,
                Value::from("File"),
                "artifact type registered with the tracking service",
            )
            .with_setting(
                "publish_path_template",
                SettingType::Template,
                Value::Null,
                "destination pattern; unset publishes the file in place",
            )
            .with_setting(
                "metadata",
                SettingType::Dict,
                Value::Dict(BTreeMap::new()),
                "extra metadata stored on the artifact record",
            )
            .with_setting(
                "version_up_work_file",
                SettingType::Bool,
                Value::Bool(false),
                "after a successful publish, save the work file to its next version",
            )
            .with_item_type_override("file.image", "publish_type", Value::from("Image"))
            .with_item_type_override("file.image.sequence", "publish_type", Value::from("Image Sequence"))
            .with_item_type_override("file.maya", "publish_type", Value::from("Maya Scene"))
    }

    fn accept(
        &self,
        ctx: &mut PluginContext<'_>,
        item: ItemId,
        _settings: &ResolvedSettings,
    ) -> Acceptance {
        if ctx.tree.item(item).property(PATH_PROPERTY).is_none() {
            debug!(item = %ctx.tree.item(item), "rejecting item without a path");
            return Acceptance::rejected();
        }
        Acceptance::accepted()
    }

    fn validate(
        &self,
        ctx: &mut PluginContext<'_>,
        item: ItemId,
        task: TaskId,
    ) -> Result<(), PluginError> {
        let path = Self::source_path(ctx.tree, item)?;
        let context = Self::require_context(ctx, item)?;

        let name = pathutil::publish_name(&path);
        let version = Self::publish_version(ctx.tree, item, &path);
        let publish_path =
            Self::resolve_publish_path(ctx, item, task, &path, &name, version)?;

        let records = ctx.tracking.find_records(&context, &name)?;
        if !records.is_empty() {
            return Err(ConflictError::RecordExists {
                context: context.key.clone(),
                name,
                count: records.len(),
            }
            .into());
        }

        if publish_path != path {
            let sources = Self::source_files(ctx.tree, item, &path);
            let existing: Vec<PathBuf> = Self::expanded_destinations(
                &sources,
                &publish_path,
                Self::is_sequence(ctx.tree, item),
            )
            .into_iter()
            .filter(|p| p.exists())
            .collect();
            if !existing.is_empty() {
                return Err(ConflictError::DestinationExists { paths: existing }.into());
            }
        }

        debug!(
            item = %ctx.tree.item(item),
            name = %name,
            version,
            publish_path = %publish_path.display(),
            "validated"
        );

        let node = ctx.tree.item_mut(item);
        node.set_property(PUBLISH_NAME_PROPERTY, Value::from(name));
        node.set_property(PUBLISH_VERSION_PROPERTY, Value::Int(version as i64));
        node.set_local_property(
            task,
            PUBLISH_PATH_PROPERTY,
            Value::from(publish_path.display().to_string()),
        );
        Ok(())
    }

    fn publish(
        &self,
        ctx: &mut PluginContext<'_>,
        item: ItemId,
        task: TaskId,
    ) -> Result<(), PluginError> {
        let path = Self::source_path(ctx.tree, item)?;
        let context = Self::require_context(ctx, item)?;
        let tree_item = ctx.tree.item(item);

        let publish_path = tree_item
            .task_property(task, PUBLISH_PATH_PROPERTY)
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .ok_or_else(|| {
                PluginError::Other("publish path not resolved; task was never validated".into())
            })?;
        let name = tree_item
            .property(PUBLISH_NAME_PROPERTY)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let version = tree_item
            .property(PUBLISH_VERSION_PROPERTY)
            .and_then(|v| v.as_int())
            .unwrap_or(1) as u32;

        let is_sequence = Self::is_sequence(ctx.tree, item);
        let sources = Self::source_files(ctx.tree, item, &path);

        let written = fileutil::copy_files(&sources, &publish_path, is_sequence)?;
        let copied: Vec<PathBuf> = written
            .iter()
            .filter(|p| !sources.contains(p))
            .cloned()
            .collect();
        ctx.tree.item_mut(item).set_local_property(
            task,
            COPIED_PATHS_PROPERTY,
            Value::List(
                copied
                    .iter()
                    .map(|p| Value::from(p.display().to_string()))
                    .collect(),
            ),
        );

        let (artifact_type, metadata) = {
            let task_ref = ctx.tree.item(item).task(task);
            let artifact_type = task_ref
                .and_then(|t| t.settings.get("publish_type"))
                .map(|s| s.value_or_default().clone())
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "File".to_string());
            let metadata = task_ref
                .and_then(|t| t.settings.get("metadata"))
                .and_then(|s| s.value().as_dict().cloned())
                .unwrap_or_default();
            (artifact_type, metadata)
        };

        let handle = ctx.tracking.register_artifact(ArtifactSpec {
            context,
            name: name.clone(),
            path: publish_path.clone(),
            version,
            artifact_type,
            dependency_handles: Self::ancestor_handles(ctx.tree, item),
            dependency_paths: Vec::new(),
            metadata,
        })?;

        info!(
            item = %ctx.tree.item(item),
            name = %name,
            version,
            handle = %handle,
            path = %publish_path.display(),
            "published"
        );

        let node = ctx.tree.item_mut(item);
        node.set_local_property(task, RECORD_HANDLE_PROPERTY, Value::Int(handle.0 as i64));
        node.set_property(RECORD_HANDLE_PROPERTY, Value::Int(handle.0 as i64));
        Ok(())
    }

    fn finalize(
        &self,
        ctx: &mut PluginContext<'_>,
        item: ItemId,
        task: TaskId,
    ) -> Result<(), PluginError> {
        let tree_item = ctx.tree.item(item);
        info!(
            item = %tree_item,
            path = %tree_item
                .task_property(task, PUBLISH_PATH_PROPERTY)
                .and_then(|v| v.as_str())
                .unwrap_or("<unknown>"),
            "publish complete"
        );

        let version_up = tree_item
            .task(task)
            .and_then(|t| t.settings.get("version_up_work_file"))
            .and_then(|s| s.value_or_default().as_bool())
            .unwrap_or(false);
        if !version_up || Self::is_sequence(ctx.tree, item) {
            return Ok(());
        }

        let path = Self::source_path(ctx.tree, item)?;
        let saved = pathutil::save_to_next_available_version(&path, |dest| {
            fs::copy(&path, dest).map(|_| ())
        })?;
        match saved {
            Some(next) => info!(path = %next.display(), "saved work file to next version"),
            None => warn!(path = %path.display(), "work file has no version to bump"),
        }
        Ok(())
    }

    /// Compensate a failed or unwanted publish of this task: remove the
    /// copied files and delete the tracking record. Tolerates partial
    /// state, so it is safe to call whether the failure happened before
    /// or after registration.
    fn undo(
        &self,
        ctx: &mut PluginContext<'_>,
        item: ItemId,
        task: TaskId,
    ) -> Result<(), PluginError> {
        let copied: Vec<PathBuf> = ctx
            .tree
            .item(item)
            .task_property(task, COPIED_PATHS_PROPERTY)
            .and_then(|v| v.as_list())
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        let failures = fileutil::delete_files(&copied);
        for failure in &failures {
            warn!(error = %failure, "undo could not remove published file");
        }
        ctx.tree
            .item_mut(item)
            .remove_local_property(task, COPIED_PATHS_PROPERTY);

        let local_handle = ctx
            .tree
            .item(item)
            .local_properties
            .get(&task)
            .and_then(|m| m.get(RECORD_HANDLE_PROPERTY))
            .and_then(|v| v.as_int());
        if let Some(handle) = local_handle {
            ctx.tracking.delete_record(RecordHandle(handle as u64))?;
            let node = ctx.tree.item_mut(item);
            node.remove_local_property(task, RECORD_HANDLE_PROPERTY);
            // Only clear the shared handle if it is the one this task set.
            if node.property(RECORD_HANDLE_PROPERTY).and_then(|v| v.as_int()) == Some(handle) {
                node.remove_property(RECORD_HANDLE_PROPERTY);
            }
        }

        info!(item = %ctx.tree.item(item), "publish rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{resolve_settings, TemplateRegistry};
    use crate::tracking::{MemoryTracking, RecordStatus, TrackingService};

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"data").unwrap();
    }

    struct Fixture {
        tree: PublishTree,
        tracking: MemoryTracking,
        templates: TemplateRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tree: PublishTree::new(),
                tracking: MemoryTracking::new(),
                templates: TemplateRegistry::new(),
            }
        }

        fn add_file_item(&mut self, parent: Option<ItemId>, path: &Path) -> ItemId {
            let parent = parent.unwrap_or_else(|| self.tree.root());
            let name = path.file_name().unwrap().to_str().unwrap().to_string();
            let item = self.tree.create_item(parent, "file.maya", &name, "Maya Scene");
            self.tree
                .item_mut(item)
                .set_property(PATH_PROPERTY, Value::from(path.display().to_string()));
            self.tree.item_mut(item).context = Some(Context::new("shotA"));
            item
        }

        fn attach_task(&mut self, item: ItemId, runtime: Option<&BTreeMap<String, Value>>) -> TaskId {
            let plugin = FilePublishPlugin::new();
            let item_type = self.tree.item(item).type_tag.clone();
            let settings = resolve_settings(
                &plugin.settings_schema(),
                None,
                Some(&item_type),
                runtime,
            )
            .unwrap();
            self.tree
                .add_task(item, plugin.id(), plugin.name(), settings, true, true)
        }

        fn ctx(&mut self) -> PluginContext<'_> {
            PluginContext {
                tree: &mut self.tree,
                tracking: &mut self.tracking,
                templates: &self.templates,
            }
        }
    }

    fn path_template_runtime() -> BTreeMap<String, Value> {
        [(
            "publish_path_template".to_string(),
            Value::from("shot_publish"),
        )]
        .into()
    }

    #[test]
    fn test_validate_computes_name_version_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scene.v004.ma");
        touch(&source);

        let mut fx = Fixture::new();
        fx.templates.insert(
            "shot_publish",
            format!("{}/pub/{{name}}.v{{version:03}}.{{ext}}", dir.path().display()),
        );
        let item = fx.add_file_item(None, &source);
        let runtime = path_template_runtime();
        let task = fx.attach_task(item, Some(&runtime));

        let plugin = FilePublishPlugin::new();
        plugin.validate(&mut fx.ctx(), item, task).unwrap();

        let node = fx.tree.item(item);
        assert_eq!(
            node.property(PUBLISH_NAME_PROPERTY),
            Some(&Value::from("scene.ma"))
        );
        assert_eq!(node.property(PUBLISH_VERSION_PROPERTY), Some(&Value::Int(4)));
        assert_eq!(
            node.task_property(task, PUBLISH_PATH_PROPERTY),
            Some(&Value::from(format!(
                "{}/pub/scene.v004.ma",
                dir.path().display()
            )))
        );
    }

    #[test]
    fn test_validate_without_template_publishes_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scene.ma");
        touch(&source);

        let mut fx = Fixture::new();
        let item = fx.add_file_item(None, &source);
        let task = fx.attach_task(item, None);

        FilePublishPlugin::new().validate(&mut fx.ctx(), item, task).unwrap();
        assert_eq!(
            fx.tree.item(item).task_property(task, PUBLISH_PATH_PROPERTY),
            Some(&Value::from(source.display().to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_existing_record() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scene.ma");
        touch(&source);

        let mut fx = Fixture::new();
        fx.tracking
            .register_artifact(ArtifactSpec {
                context: Context::new("shotA"),
                name: "scene.ma".to_string(),
                path: PathBuf::from("/pub/scene.ma"),
                version: 1,
                artifact_type: "File".to_string(),
                dependency_handles: Vec::new(),
                dependency_paths: Vec::new(),
                metadata: BTreeMap::new(),
            })
            .unwrap();
        let item = fx.add_file_item(None, &source);
        let task = fx.attach_task(item, None);

        let err = FilePublishPlugin::new()
            .validate(&mut fx.ctx(), item, task)
            .unwrap_err();
        assert!(matches!(
            err,
            PluginError::Conflict(ConflictError::RecordExists { count: 1, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scene.v001.ma");
        touch(&source);
        touch(&dir.path().join("pub/scene.v001.ma"));

        let mut fx = Fixture::new();
        fx.templates.insert(
            "shot_publish",
            format!("{}/pub/{{name}}.v{{version:03}}.{{ext}}", dir.path().display()),
        );
        let item = fx.add_file_item(None, &source);
        let runtime = path_template_runtime();
        let task = fx.attach_task(item, Some(&runtime));

        let err = FilePublishPlugin::new()
            .validate(&mut fx.ctx(), item, task)
            .unwrap_err();
        assert!(matches!(
            err,
            PluginError::Conflict(ConflictError::DestinationExists { .. })
        ));
    }

    #[test]
    fn test_version_cascades_from_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let parent_path = dir.path().join("scene.v007.ma");
        let child_path = dir.path().join("render.exr");
        touch(&parent_path);
        touch(&child_path);

        let mut fx = Fixture::new();
        let parent = fx.add_file_item(None, &parent_path);
        let child = fx.add_file_item(Some(parent), &child_path);
        let parent_task = fx.attach_task(parent, None);
        let child_task = fx.attach_task(child, None);

        let plugin = FilePublishPlugin::new();
        plugin.validate(&mut fx.ctx(), parent, parent_task).unwrap();
        plugin.validate(&mut fx.ctx(), child, child_task).unwrap();

        // The child has no version of its own; it inherits the parent's.
        assert_eq!(
            fx.tree.item(child).property(PUBLISH_VERSION_PROPERTY),
            Some(&Value::Int(7))
        );
    }

    #[test]
    fn test_publish_copies_registers_and_undo_reverses() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scene.v002.ma");
        touch(&source);

        let mut fx = Fixture::new();
        fx.templates.insert(
            "shot_publish",
            format!("{}/pub/{{name}}.v{{version:03}}.{{ext}}", dir.path().display()),
        );
        let item = fx.add_file_item(None, &source);
        let runtime = path_template_runtime();
        let task = fx.attach_task(item, Some(&runtime));

        let plugin = FilePublishPlugin::new();
        plugin.validate(&mut fx.ctx(), item, task).unwrap();
        plugin.publish(&mut fx.ctx(), item, task).unwrap();

        let published = dir.path().join("pub/scene.v002.ma");
        assert!(published.exists());
        let records: Vec<_> = fx.tracking.records().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, 2);
        assert_eq!(records[0].status, RecordStatus::Active);

        plugin.undo(&mut fx.ctx(), item, task).unwrap();
        assert!(!published.exists());
        assert!(source.exists());
        assert_eq!(
            fx.tracking.records().next().unwrap().status,
            RecordStatus::Deleted
        );
        assert!(fx.tree.item(item).property(RECORD_HANDLE_PROPERTY).is_none());
    }

    #[test]
    fn test_publish_links_parent_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let parent_path = dir.path().join("scene.v001.ma");
        let child_path = dir.path().join("cache.v001.abc");
        touch(&parent_path);
        touch(&child_path);

        let mut fx = Fixture::new();
        let parent = fx.add_file_item(None, &parent_path);
        let child = fx.add_file_item(Some(parent), &child_path);
        let parent_task = fx.attach_task(parent, None);
        let child_task = fx.attach_task(child, None);

        let plugin = FilePublishPlugin::new();
        plugin.validate(&mut fx.ctx(), parent, parent_task).unwrap();
        plugin.validate(&mut fx.ctx(), child, child_task).unwrap();
        plugin.publish(&mut fx.ctx(), parent, parent_task).unwrap();
        plugin.publish(&mut fx.ctx(), child, child_task).unwrap();

        let records: Vec<_> = fx.tracking.records().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].dependency_handles, vec![records[0].handle]);
    }

    #[test]
    fn test_sequence_publish_expands_frames() {
        let dir = tempfile::tempdir().unwrap();
        for frame in 1001..=1003 {
            touch(&dir.path().join(format!("render.{}.exr", frame)));
        }

        let mut fx = Fixture::new();
        fx.templates.insert(
            "seq_publish",
            format!("{}/pub/render.%04d.exr", dir.path().display()),
        );
        let pattern = dir.path().join("render.%04d.exr");
        let item = fx.tree.create_item(
            fx.tree.root(),
            "file.image.sequence",
            "render.%04d.exr",
            "Image Sequence",
        );
        fx.tree.item_mut(item).context = Some(Context::new("shotA"));
        fx.tree
            .item_mut(item)
            .set_property(PATH_PROPERTY, Value::from(pattern.display().to_string()));
        fx.tree.item_mut(item).set_property(
            SEQUENCE_PATHS_PROPERTY,
            Value::List(
                (1001..=1003)
                    .map(|f| {
                        Value::from(
                            dir.path()
                                .join(format!("render.{}.exr", f))
                                .display()
                                .to_string(),
                        )
                    })
                    .collect(),
            ),
        );
        let runtime: BTreeMap<String, Value> = [(
            "publish_path_template".to_string(),
            Value::from("seq_publish"),
        )]
        .into();
        let task = fx.attach_task(item, Some(&runtime));

        let plugin = FilePublishPlugin::new();
        plugin.validate(&mut fx.ctx(), item, task).unwrap();
        plugin.publish(&mut fx.ctx(), item, task).unwrap();

        for frame in 1001..=1003 {
            assert!(dir.path().join(format!("pub/render.{}.exr", frame)).exists());
        }
        // The registered path is the pattern, not one frame.
        assert_eq!(
            fx.tracking.records().next().unwrap().path,
            dir.path().join("pub/render.%04d.exr")
        );
    }

    #[test]
    fn test_finalize_versions_up_work_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scene.v004.ma");
        touch(&source);

        let mut fx = Fixture::new();
        let item = fx.add_file_item(None, &source);
        let runtime: BTreeMap<String, Value> = [(
            "version_up_work_file".to_string(),
            Value::Bool(true),
        )]
        .into();
        let task = fx.attach_task(item, Some(&runtime));

        let plugin = FilePublishPlugin::new();
        plugin.validate(&mut fx.ctx(), item, task).unwrap();
        plugin.publish(&mut fx.ctx(), item, task).unwrap();
        plugin.finalize(&mut fx.ctx(), item, task).unwrap();

        assert!(dir.path().join("scene.v005.ma").exists());
    }

    #[test]
    fn test_accept_requires_path() {
        let mut fx = Fixture::new();
        let item = fx
            .tree
            .create_item(fx.tree.root(), "file.maya", "scene.ma", "Maya Scene");
        let acceptance = FilePublishPlugin::new().accept(
            &mut fx.ctx(),
            item,
            &ResolvedSettings::default(),
        );
        assert!(!acceptance.accepted);
    }
}

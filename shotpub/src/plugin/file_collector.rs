//! The built-in file collector.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::pathutil;
use crate::settings::{ResolvedSettings, SettingType, SettingsSchema, Value};
use crate::tree::{ItemId, PublishTree};

use super::{Collector, PluginContext, PluginError};

/// Property recording the path an item was originally collected from.
/// Used to skip paths that already have an item in the tree.
pub const COLLECTED_PATH_PROPERTY: &str = "collected_file_path";

/// Property holding the item's file path. For sequences this is the
/// frame-pattern path.
pub const PATH_PROPERTY: &str = "path";

/// Property holding the expanded member paths of a sequence item.
pub const SEQUENCE_PATHS_PROPERTY: &str = "sequence_paths";

const IMAGE_EXTENSIONS: &[&str] = &["exr", "dpx", "png", "jpg", "jpeg", "tif", "tiff"];

/// Map a file extension to an item type tag and display label.
fn item_type_for_extension(extension: &str) -> (&'static str, &'static str) {
    match extension.to_ascii_lowercase().as_str() {
        "abc" => ("file.alembic", "Alembic Cache"),
        "ma" | "mb" => ("file.maya", "Maya Scene"),
        "hip" | "hipnc" => ("file.houdini", "Houdini Scene"),
        "nk" => ("file.nuke", "Nuke Script"),
        "psd" | "psb" => ("file.photoshop", "Photoshop Image"),
        "obj" | "fbx" => ("file.geometry", "Geometry File"),
        "mov" | "mp4" | "avi" => ("file.video", "Video File"),
        "exr" | "dpx" | "png" | "jpg" | "jpeg" | "tif" | "tiff" => ("file.image", "Image File"),
        _ => ("file", "File"),
    }
}

/// Collects publish items from dropped-in paths and from a configured
/// preload folder.
///
/// A folder is scanned for frame sequences; a single file that carries a
/// frame number is promoted to a sequence item when sibling frames exist
/// next to it on disk.
#[derive(Debug, Default)]
pub struct FileCollector;

impl FileCollector {
    pub fn new() -> Self {
        Self
    }

    fn collect_file(
        &self,
        tree: &mut PublishTree,
        parent: ItemId,
        path: &Path,
    ) -> Result<Vec<ItemId>, PluginError> {
        // A file with a frame number and at least one sibling frame is
        // collected as the whole sequence, not the single frame.
        if pathutil::frame_number(path).is_some() {
            if let Some(pattern) = pathutil::sequence_pattern(path) {
                let members = pathutil::sequence_files(&pattern);
                if members.len() > 1 {
                    return Ok(vec![self.create_sequence_item(
                        tree, parent, &pattern, members, path,
                    )]);
                }
            }
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let (type_tag, type_label) = item_type_for_extension(extension);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let item = tree.create_item(parent, type_tag, &file_name, type_label);
        info!(path = %path.display(), item_type = type_tag, "collected file");

        let node = tree.item_mut(item);
        node.set_property(PATH_PROPERTY, Value::from(path.display().to_string()));
        node.set_property(
            COLLECTED_PATH_PROPERTY,
            Value::from(path.display().to_string()),
        );
        seed_fields(tree, item, path);
        Ok(vec![item])
    }

    fn collect_folder(
        &self,
        tree: &mut PublishTree,
        parent: ItemId,
        folder: &Path,
    ) -> Result<Vec<ItemId>, PluginError> {
        let sequences = pathutil::frame_sequences(folder, Some(IMAGE_EXTENSIONS))
            .map_err(|e| PluginError::Other(format!("cannot scan {}: {}", folder.display(), e)))?;

        if sequences.is_empty() {
            warn!(folder = %folder.display(), "no image sequences found in folder");
            return Ok(Vec::new());
        }

        let mut items = Vec::with_capacity(sequences.len());
        for sequence in sequences {
            items.push(self.create_sequence_item(
                tree,
                parent,
                &sequence.pattern,
                sequence.files,
                folder,
            ));
        }
        Ok(items)
    }

    fn create_sequence_item(
        &self,
        tree: &mut PublishTree,
        parent: ItemId,
        pattern: &Path,
        members: Vec<PathBuf>,
        collected_from: &Path,
    ) -> ItemId {
        let name = pattern
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let item = tree.create_item(parent, "file.image.sequence", &name, "Image Sequence");
        info!(
            pattern = %pattern.display(),
            frames = members.len(),
            "collected image sequence"
        );

        let node = tree.item_mut(item);
        node.set_property(PATH_PROPERTY, Value::from(pattern.display().to_string()));
        node.set_property(
            SEQUENCE_PATHS_PROPERTY,
            Value::List(
                members
                    .iter()
                    .map(|p| Value::from(p.display().to_string()))
                    .collect(),
            ),
        );
        node.set_property(
            COLLECTED_PATH_PROPERTY,
            Value::from(collected_from.display().to_string()),
        );
        seed_fields(tree, item, pattern);
        item
    }
}

/// Cache template fields inferable from the path itself. The `name`
/// field is the bare stem: publish name minus extension and frame run.
fn seed_fields(tree: &mut PublishTree, item: ItemId, path: &Path) {
    let mut name = pathutil::publish_name(path);
    if let Some(dot) = name.rfind('.') {
        name.truncate(dot);
    }
    let name = name.trim_end_matches('#').trim_end_matches('.').to_string();

    let mut fields = std::collections::BTreeMap::new();
    fields.insert("name".to_string(), Value::from(name));
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        fields.insert("ext".to_string(), Value::from(ext));
    }
    if let Some(version) = pathutil::version_number(path) {
        fields.insert("version".to_string(), Value::Int(version as i64));
    }
    tree.item_mut(item).cache_fields(fields);
}

impl Collector for FileCollector {
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new().with_setting(
            "preload_folder",
            SettingType::Str,
            Value::Null,
            "folder scanned during session collection",
        )
    }

    fn process_current_session(
        &self,
        ctx: &mut PluginContext<'_>,
        settings: &ResolvedSettings,
        parent: ItemId,
    ) -> Result<Vec<ItemId>, PluginError> {
        let Some(folder) = settings
            .get("preload_folder")
            .and_then(|s| s.value().as_str())
            .map(PathBuf::from)
        else {
            debug!("no preload folder configured, session collection is empty");
            return Ok(Vec::new());
        };

        let mut items = self.collect_folder(ctx.tree, parent, &folder)?;

        // Loose files in the folder that belong to no sequence are
        // collected individually.
        let entries = std::fs::read_dir(&folder)
            .map_err(|e| PluginError::Other(format!("cannot scan {}: {}", folder.display(), e)))?;
        let mut loose: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && pathutil::frame_number(p).is_none())
            .collect();
        loose.sort();
        for path in loose {
            items.extend(self.collect_file(ctx.tree, parent, &path)?);
        }
        Ok(items)
    }

    fn process_file(
        &self,
        ctx: &mut PluginContext<'_>,
        _settings: &ResolvedSettings,
        parent: ItemId,
        path: &Path,
    ) -> Result<Vec<ItemId>, PluginError> {
        if path.is_dir() {
            self.collect_folder(ctx.tree, parent, path)
        } else {
            self.collect_file(ctx.tree, parent, path)
        }
    }

    fn on_context_changed(
        &self,
        ctx: &mut PluginContext<'_>,
        item: ItemId,
    ) -> Result<(), PluginError> {
        // Context fields win over path-derived ones, so refresh the cache
        // with the new context on top.
        let Some(context) = ctx.tree.context_for(item).cloned() else {
            return Ok(());
        };
        debug!(item = %ctx.tree.item(item), context = %context, "re-caching fields after context change");
        ctx.tree.item_mut(item).cache_fields(context.fields);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{resolve_settings, TemplateRegistry};
    use crate::tracking::MemoryTracking;
    use std::collections::BTreeMap;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    fn collect(tree: &mut PublishTree, path: &Path) -> Vec<ItemId> {
        let mut tracking = MemoryTracking::new();
        let templates = TemplateRegistry::new();
        let mut ctx = PluginContext {
            tree,
            tracking: &mut tracking,
            templates: &templates,
        };
        let root = ctx.tree.root();
        FileCollector::new()
            .process_file(&mut ctx, &ResolvedSettings::default(), root, path)
            .unwrap()
    }

    #[test]
    fn test_collect_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.v003.ma");
        touch(&path);

        let mut tree = PublishTree::new();
        let items = collect(&mut tree, &path);
        assert_eq!(items.len(), 1);

        let item = tree.item(items[0]);
        assert_eq!(item.type_tag, "file.maya");
        assert_eq!(item.name, "scene.v003.ma");
        assert_eq!(
            item.property(PATH_PROPERTY).unwrap().as_str(),
            path.to_str()
        );
        let fields = item.fields();
        assert_eq!(fields.get("name"), Some(&Value::from("scene")));
        assert_eq!(fields.get("version"), Some(&Value::Int(3)));
        assert_eq!(fields.get("ext"), Some(&Value::from("ma")));
    }

    #[test]
    fn test_collect_file_with_siblings_becomes_sequence() {
        let dir = tempfile::tempdir().unwrap();
        for frame in 1001..=1003 {
            touch(&dir.path().join(format!("render.{}.exr", frame)));
        }

        let mut tree = PublishTree::new();
        let items = collect(&mut tree, &dir.path().join("render.1002.exr"));
        assert_eq!(items.len(), 1);

        let item = tree.item(items[0]);
        assert_eq!(item.type_tag, "file.image.sequence");
        assert_eq!(item.name, "render.%04d.exr");
        let members = item
            .property(SEQUENCE_PATHS_PROPERTY)
            .unwrap()
            .as_list()
            .unwrap();
        assert_eq!(members.len(), 3);
    }

    #[test]
    fn test_lone_frame_stays_a_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plate.0001.dpx");
        touch(&path);

        let mut tree = PublishTree::new();
        let items = collect(&mut tree, &path);
        assert_eq!(tree.item(items[0]).type_tag, "file.image");
    }

    #[test]
    fn test_collect_folder_groups_sequences() {
        let dir = tempfile::tempdir().unwrap();
        for frame in 1001..=1002 {
            touch(&dir.path().join(format!("beauty.{}.exr", frame)));
            touch(&dir.path().join(format!("depth.{}.exr", frame)));
        }
        touch(&dir.path().join("notes.txt"));

        let mut tree = PublishTree::new();
        let items = collect(&mut tree, dir.path());
        assert_eq!(items.len(), 2);
        assert!(items
            .iter()
            .all(|i| tree.item(*i).type_tag == "file.image.sequence"));
    }

    #[test]
    fn test_session_collection_from_preload_folder() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("scene.ma"));
        touch(&dir.path().join("render.1001.exr"));
        touch(&dir.path().join("render.1002.exr"));

        let collector = FileCollector::new();
        let runtime: BTreeMap<String, Value> = [(
            "preload_folder".to_string(),
            Value::from(dir.path().display().to_string()),
        )]
        .into();
        let settings =
            resolve_settings(&collector.settings_schema(), None, None, Some(&runtime)).unwrap();

        let mut tree = PublishTree::new();
        let mut tracking = MemoryTracking::new();
        let templates = TemplateRegistry::new();
        let root = tree.root();
        let mut ctx = PluginContext {
            tree: &mut tree,
            tracking: &mut tracking,
            templates: &templates,
        };
        let items = collector
            .process_current_session(&mut ctx, &settings, root)
            .unwrap();

        let tags: Vec<&str> = items.iter().map(|i| tree.item(*i).type_tag.as_str()).collect();
        assert_eq!(tags, vec!["file.image.sequence", "file.maya"]);
    }

    #[test]
    fn test_context_change_recaches_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.ma");
        touch(&path);

        let mut tree = PublishTree::new();
        let item = collect(&mut tree, &path)[0];
        tree.item_mut(item).context = Some(
            crate::tree::Context::new("shotA").with_field("shot", "010"),
        );

        let mut tracking = MemoryTracking::new();
        let templates = TemplateRegistry::new();
        let mut ctx = PluginContext {
            tree: &mut tree,
            tracking: &mut tracking,
            templates: &templates,
        };
        FileCollector::new().on_context_changed(&mut ctx, item).unwrap();

        assert_eq!(tree.item(item).fields().get("shot"), Some(&Value::from("010")));
    }
}

//! Publish items: nodes of the publish tree.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::settings::Value;

use super::context::Context;
use super::task::{PublishTask, TaskId};

/// Identifier of an item, unique within one tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Property name under which template fields are cached on an item.
pub const FIELDS_PROPERTY: &str = "fields";

/// One publishable thing in the tree.
///
/// Items carry two property scopes: a global bag visible to every task on
/// the item, and per-task overlays that shadow the global value for one
/// task's view only. The overlay is what lets two plugins attached to the
/// same item compute different values for the same logical property (two
/// different publish paths, say) without clobbering each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishItem {
    pub(crate) id: ItemId,
    pub(crate) parent: Option<ItemId>,
    pub(crate) children: Vec<ItemId>,

    /// Hierarchical dotted type tag, e.g. `file.image.sequence`.
    pub type_tag: String,

    /// Stable name used for filter matching.
    pub name: String,

    /// Human-readable display name.
    pub display_name: String,

    /// Resolved context, if any. Items without one inherit their
    /// parent's; see [`super::PublishTree::context_for`].
    pub context: Option<Context>,

    /// Whether this item (and with it, its subtree) participates in
    /// execution.
    pub active: bool,

    /// Persistent items survive a session re-collect. Only top-level
    /// items are marked persistent.
    pub persistent: bool,

    pub(crate) properties: BTreeMap<String, Value>,
    pub(crate) local_properties: BTreeMap<TaskId, BTreeMap<String, Value>>,
    pub(crate) tasks: Vec<PublishTask>,
}

impl PublishItem {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    pub fn children(&self) -> &[ItemId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn tasks(&self) -> &[PublishTask] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&PublishTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut PublishTask> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Read a global property.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Read a property from a task's point of view: the task-local
    /// overlay first, then the global bag.
    pub fn task_property(&self, task: TaskId, name: &str) -> Option<&Value> {
        self.local_properties
            .get(&task)
            .and_then(|local| local.get(name))
            .or_else(|| self.properties.get(name))
    }

    /// Set a global property, visible to all tasks on this item.
    pub fn set_property(&mut self, name: impl Into<String>, value: Value) {
        self.properties.insert(name.into(), value);
    }

    /// Set a task-local property, shadowing the global value for that
    /// task only.
    pub fn set_local_property(&mut self, task: TaskId, name: impl Into<String>, value: Value) {
        self.local_properties
            .entry(task)
            .or_default()
            .insert(name.into(), value);
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    pub fn remove_local_property(&mut self, task: TaskId, name: &str) -> Option<Value> {
        self.local_properties
            .get_mut(&task)
            .and_then(|local| local.remove(name))
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// The item's cached template fields (the `fields` property), or an
    /// empty map when none are cached.
    pub fn fields(&self) -> BTreeMap<String, Value> {
        self.properties
            .get(FIELDS_PROPERTY)
            .and_then(|v| v.as_dict())
            .cloned()
            .unwrap_or_default()
    }

    /// Merge values into the cached `fields` property.
    pub fn cache_fields(&mut self, fields: BTreeMap<String, Value>) {
        let mut merged = self.fields();
        merged.extend(fields);
        self.properties
            .insert(FIELDS_PROPERTY.to_string(), Value::Dict(merged));
    }
}

impl fmt::Display for PublishItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.type_tag)
    }
}

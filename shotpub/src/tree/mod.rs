//! The publish item/task tree.
//!
//! The tree is the shared mutable data structure every other component
//! reads and writes: collectors append items under the synthetic root,
//! the accept pass attaches tasks, and the execution passes write
//! computed results back as properties.
//!
//! The tree is append-only during a run: an unsuccessful publish triggers
//! compensating undo actions on properties and external state, never node
//! removal. There is no API to re-parent a node, so the structure is
//! acyclic by construction and traversal cannot loop.

use std::collections::BTreeMap;

use tracing::debug;

use crate::settings::{ResolvedSettings, Value};

mod context;
mod generator;
mod item;
mod serialize;
mod task;

pub use context::Context;
pub use generator::{TaskGenerator, TaskHandle};
pub use item::{ItemId, PublishItem, FIELDS_PROPERTY};
pub use serialize::TreeError;
pub use task::{PublishTask, TaskId, TaskStatus};

/// The tree of items to publish, rooted at one synthetic root item.
#[derive(Debug, Clone)]
pub struct PublishTree {
    // Arena indexed by ItemId. Cleared items leave tombstones so ids of
    // surviving items stay stable.
    items: Vec<Option<PublishItem>>,
    next_task_id: u64,
}

impl Default for PublishTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishTree {
    /// Create an empty tree containing only the synthetic root.
    pub fn new() -> Self {
        let root = PublishItem {
            id: ItemId(0),
            parent: None,
            children: Vec::new(),
            type_tag: "root".to_string(),
            name: "__root__".to_string(),
            display_name: "Publish Root".to_string(),
            context: None,
            active: true,
            persistent: true,
            properties: BTreeMap::new(),
            local_properties: BTreeMap::new(),
            tasks: Vec::new(),
        };
        Self {
            items: vec![Some(root)],
            next_task_id: 0,
        }
    }

    /// The synthetic root item's id.
    pub fn root(&self) -> ItemId {
        ItemId(0)
    }

    /// Append a new item under the given parent.
    ///
    /// The context is left unset; reads through [`PublishTree::context_for`]
    /// fall back to the nearest ancestor with a resolved context.
    pub fn create_item(
        &mut self,
        parent: ItemId,
        type_tag: impl Into<String>,
        name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> ItemId {
        let id = ItemId(self.items.len() as u64);
        let item = PublishItem {
            id,
            parent: Some(parent),
            children: Vec::new(),
            type_tag: type_tag.into(),
            name: name.into(),
            display_name: display_name.into(),
            context: None,
            active: true,
            persistent: false,
            properties: BTreeMap::new(),
            local_properties: BTreeMap::new(),
            tasks: Vec::new(),
        };
        debug!(item = %item, parent = %parent, "created publish item");
        self.items.push(Some(item));
        self.item_mut(parent).children.push(id);
        id
    }

    /// Borrow an item.
    ///
    /// # Panics
    ///
    /// Panics if the id refers to a cleared item; ids must not be retained
    /// across [`PublishTree::clear`].
    pub fn item(&self, id: ItemId) -> &PublishItem {
        self.items[id.0 as usize]
            .as_ref()
            .expect("item id refers to a cleared item")
    }

    /// Mutably borrow an item. Panics like [`PublishTree::item`].
    pub fn item_mut(&mut self, id: ItemId) -> &mut PublishItem {
        self.items[id.0 as usize]
            .as_mut()
            .expect("item id refers to a cleared item")
    }

    /// Borrow an item, returning `None` for cleared or unknown ids.
    pub fn try_item(&self, id: ItemId) -> Option<&PublishItem> {
        self.items.get(id.0 as usize).and_then(|slot| slot.as_ref())
    }

    /// Number of live items, excluding the root.
    pub fn len(&self) -> usize {
        self.items.iter().flatten().count().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pre-order traversal of all live items, excluding the root.
    ///
    /// Each call produces a fresh, restartable traversal in a stable
    /// order: children in creation order, parents before children.
    pub fn iter(&self) -> impl Iterator<Item = ItemId> + '_ {
        let mut stack: Vec<ItemId> = self.item(self.root()).children.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let item = self.item(id);
            stack.extend(item.children.iter().rev().copied());
            Some(id)
        })
    }

    /// All live descendants of an item, pre-order.
    pub fn descendants(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack: Vec<ItemId> = self.item(id).children.iter().rev().copied().collect();
        while let Some(child) = stack.pop() {
            out.push(child);
            stack.extend(self.item(child).children.iter().rev().copied());
        }
        out
    }

    /// The effective context for an item: its own if resolved, else the
    /// nearest ancestor's.
    pub fn context_for(&self, id: ItemId) -> Option<&Context> {
        let mut current = Some(id);
        while let Some(item_id) = current {
            let item = self.item(item_id);
            if let Some(context) = &item.context {
                return Some(context);
            }
            current = item.parent;
        }
        None
    }

    /// Whether an item participates in execution: the AND of its own
    /// `active` flag and every ancestor's. Deactivating an item
    /// deactivates its whole subtree regardless of the children's own
    /// flags.
    pub fn is_effectively_active(&self, id: ItemId) -> bool {
        let mut current = Some(id);
        while let Some(item_id) = current {
            let item = self.item(item_id);
            if !item.active {
                return false;
            }
            current = item.parent;
        }
        true
    }

    /// Attach a task to an item.
    pub fn add_task(
        &mut self,
        item: ItemId,
        plugin_id: impl Into<String>,
        name: impl Into<String>,
        settings: ResolvedSettings,
        active: bool,
        visible: bool,
    ) -> TaskId {
        let id = TaskId(self.next_task_id);
        self.next_task_id += 1;
        let task = PublishTask {
            id,
            plugin_id: plugin_id.into(),
            name: name.into(),
            active,
            visible,
            settings,
            status: TaskStatus::Pending,
        };
        debug!(task = %id, item = %item, plugin = %task.plugin_id, "attached task");
        self.item_mut(item).tasks.push(task);
        id
    }

    /// Remove all tasks (and their local property overlays) from an item.
    ///
    /// Used when plugins are re-attached after a context change.
    pub fn clear_tasks(&mut self, item: ItemId) {
        let item = self.item_mut(item);
        item.tasks.clear();
        item.local_properties.clear();
    }

    /// Convenience two-tier property read: task-local overlay first when a
    /// task is given, then the item's global bag.
    pub fn get_property<'a>(
        &'a self,
        item: ItemId,
        task: Option<TaskId>,
        name: &str,
    ) -> Option<&'a Value> {
        let item = self.item(item);
        match task {
            Some(task) => item.task_property(task, name),
            None => item.property(name),
        }
    }

    /// Remove collected items from the tree.
    ///
    /// With `keep_persistent` set, top-level items marked persistent (and
    /// their subtrees) survive; everything else is removed. Ids of removed
    /// items become invalid.
    pub fn clear(&mut self, keep_persistent: bool) {
        let root = self.root();
        let top_level: Vec<ItemId> = self.item(root).children.clone();
        for id in top_level {
            if keep_persistent && self.item(id).persistent {
                continue;
            }
            for descendant in self.descendants(id) {
                self.items[descendant.0 as usize] = None;
            }
            self.items[id.0 as usize] = None;
            let root_item = self.item_mut(root);
            root_item.children.retain(|c| *c != id);
        }
    }

    /// Items surviving a non-persistent clear.
    pub fn persistent_items(&self) -> Vec<ItemId> {
        self.item(self.root())
            .children
            .iter()
            .copied()
            .filter(|id| self.item(*id).persistent)
            .collect()
    }
}

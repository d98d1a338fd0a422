//! Filtered task enumeration.
//!
//! The generator is the single enumeration path all execution passes
//! share. It walks the tree in pre-order and yields one [`TaskHandle`]
//! at a time, letting the caller mutate the tree (statuses, properties)
//! between pulls and report each outcome back before pulling the next.

use glob::{Pattern, PatternError};
use tracing::{debug, trace};

use super::item::ItemId;
use super::task::{TaskId, TaskStatus};
use super::PublishTree;

/// One (item, task) pair yielded by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
    pub item: ItemId,
    pub task: TaskId,
}

/// Cursor over the active, filter-matching tasks of a tree.
///
/// Items are visited in the tree's stable pre-order; within an item,
/// tasks in attachment order. An item whose name matches none of the
/// item filters contributes no tasks, but its descendants are still
/// considered. Inactive tasks and tasks on effectively-inactive items
/// are never yielded.
pub struct TaskGenerator {
    item_filters: Vec<Pattern>,
    task_filters: Vec<Pattern>,
    // Remaining items in visit order, seeded from the tree on first pull.
    pending: Option<Vec<ItemId>>,
    current: Option<(ItemId, usize)>,
    processed: Vec<(TaskHandle, TaskStatus)>,
}

impl TaskGenerator {
    /// Build a generator from glob-style name filters. Empty filter
    /// lists match everything.
    pub fn new(item_filters: &[String], task_filters: &[String]) -> Result<Self, PatternError> {
        Ok(Self {
            item_filters: compile(item_filters)?,
            task_filters: compile(task_filters)?,
            pending: None,
            current: None,
            processed: Vec::new(),
        })
    }

    /// Advance to the next matching task, or `None` when exhausted.
    pub fn next(&mut self, tree: &PublishTree) -> Option<TaskHandle> {
        // Snapshot the item order once; identical filters over an
        // unchanged tree always enumerate in the same order.
        let pending = self.pending.get_or_insert_with(|| {
            let mut items: Vec<ItemId> = tree.iter().collect();
            items.reverse();
            items
        });

        loop {
            if let Some((item_id, index)) = self.current {
                let item = tree.item(item_id);
                if let Some(task) = item.tasks().get(index) {
                    self.current = Some((item_id, index + 1));
                    if !task.active {
                        trace!(item = %item, task = %task.name, "skipping inactive task");
                        continue;
                    }
                    if !matches(&self.task_filters, &task.name) {
                        trace!(item = %item, task = %task.name, "task filtered out");
                        continue;
                    }
                    return Some(TaskHandle {
                        item: item_id,
                        task: task.id(),
                    });
                }
                self.current = None;
            }

            let item_id = pending.pop()?;
            if !tree.is_effectively_active(item_id) {
                trace!(item = %tree.item(item_id), "skipping inactive item");
                continue;
            }
            if !matches(&self.item_filters, &tree.item(item_id).name) {
                trace!(item = %tree.item(item_id), "item filtered out");
                continue;
            }
            self.current = Some((item_id, 0));
        }
    }

    /// Record the outcome of the last-yielded task before the next pull.
    pub fn report_status(&mut self, tree: &PublishTree, handle: TaskHandle, status: TaskStatus) {
        let item = tree.item(handle.item);
        let task_name = item
            .task(handle.task)
            .map(|t| t.name.as_str())
            .unwrap_or("<unknown>");
        debug!(item = %item, task = %task_name, status = %status, "task processed");
        self.processed.push((handle, status));
    }

    /// Outcomes reported so far, in processing order.
    pub fn processed(&self) -> &[(TaskHandle, TaskStatus)] {
        &self.processed
    }
}

fn compile(filters: &[String]) -> Result<Vec<Pattern>, PatternError> {
    filters.iter().map(|f| Pattern::new(f)).collect()
}

fn matches(filters: &[Pattern], name: &str) -> bool {
    filters.is_empty() || filters.iter().any(|p| p.matches(name))
}

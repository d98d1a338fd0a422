//! Publish tasks: one (item, plugin) execution unit.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::settings::ResolvedSettings;

/// Identifier of a task, unique within one tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Transient execution status of a task across the three passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Created, not yet validated.
    Pending,

    /// `validate` returned true.
    Validated,

    /// `validate` returned false or raised. Terminal for this run; the
    /// task is excluded from the publish pass.
    ValidationFailed,

    /// `publish` completed.
    Published,

    /// `publish` raised; undo has not yet completed.
    PublishFailed,

    /// `publish` raised and the compensating undo ran.
    RolledBack,

    /// Skipped during the publish pass because an ancestor item's publish
    /// failed and its registration is presumed a dependency.
    SkippedDependency,

    /// `finalize` completed.
    Finalized,

    /// `finalize` raised. Recorded only; the publish itself stands.
    FinalizeFailed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Validated => "validated",
            TaskStatus::ValidationFailed => "validation failed",
            TaskStatus::Published => "published",
            TaskStatus::PublishFailed => "publish failed",
            TaskStatus::RolledBack => "rolled back",
            TaskStatus::SkippedDependency => "skipped (ancestor failed)",
            TaskStatus::Finalized => "finalized",
            TaskStatus::FinalizeFailed => "finalize failed",
        };
        write!(f, "{}", name)
    }
}

/// A plugin attached to an item with its resolved settings.
///
/// Tasks are created once per (item, plugin) pairing when the plugin
/// accepts the item, and persist for the life of one publish run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishTask {
    pub(crate) id: TaskId,

    /// Registry identifier of the plugin this task runs.
    pub plugin_id: String,

    /// Display name (the plugin's name at accept time).
    pub name: String,

    /// Whether this task participates in execution. Plugins that accept
    /// an item but report it disabled or unchecked produce an inactive
    /// task: still enumerable, never executed.
    pub active: bool,

    /// Whether a UI should present this task.
    pub visible: bool,

    /// Settings view resolved at accept time plus any runtime edits.
    pub settings: ResolvedSettings,

    /// Execution status, updated by the engine as passes run.
    pub status: TaskStatus,
}

impl PublishTask {
    pub fn id(&self) -> TaskId {
        self.id
    }
}

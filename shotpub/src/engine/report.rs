//! Pass and run reports.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tree::TaskStatus;

/// Which execution pass a report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassKind {
    Validate,
    Publish,
    Finalize,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassKind::Validate => "validate",
            PassKind::Publish => "publish",
            PassKind::Finalize => "finalize",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of one task in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub item_name: String,
    pub task_name: String,
    pub status: TaskStatus,

    /// Failure message, when there is one to surface.
    pub message: Option<String>,
}

impl TaskOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::ValidationFailed
                | TaskStatus::PublishFailed
                | TaskStatus::RolledBack
                | TaskStatus::SkippedDependency
                | TaskStatus::FinalizeFailed
        )
    }
}

/// Everything that happened during one pass, in processing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub kind: PassKind,
    pub outcomes: Vec<TaskOutcome>,
}

impl PassReport {
    pub fn new(kind: PassKind) -> Self {
        Self {
            kind,
            outcomes: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        item_name: impl Into<String>,
        task_name: impl Into<String>,
        status: TaskStatus,
        message: Option<String>,
    ) {
        self.outcomes.push(TaskOutcome {
            item_name: item_name.into(),
            task_name: task_name.into(),
            status,
            message,
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// The aggregate result of a full publish run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub passes: Vec<PassReport>,

    /// Set when the run stopped early on a cancellation request.
    pub cancelled: bool,
}

impl RunReport {
    pub fn pass(&self, kind: PassKind) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.kind == kind)
    }

    pub fn is_success(&self) -> bool {
        !self.cancelled && self.passes.iter().all(|p| p.is_success())
    }
}

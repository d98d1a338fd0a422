//! Artifact tracking service abstraction.
//!
//! Publish plugins register produced artifacts with a tracking service so
//! downstream consumers can discover them by context and name. The engine
//! only ever talks to the [`TrackingService`] trait; production deployments
//! back it with their asset database, tests and the bundled CLI use the
//! in-memory implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::settings::Value;
use crate::tree::Context;

/// Opaque identifier of one registered artifact record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RecordHandle(pub u64);

impl fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record#{}", self.0)
    }
}

/// Lifecycle status of a record. Deleted records stay queryable by handle
/// but no longer count as conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    Active,
    Deleted,
}

/// Everything a plugin supplies when registering an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub context: Context,
    pub name: String,
    pub path: PathBuf,
    pub version: u32,
    pub artifact_type: String,

    /// Handles of records this artifact was produced from, when those
    /// records were registered earlier in the same run.
    pub dependency_handles: Vec<RecordHandle>,

    /// Source paths for upstream inputs with no registered record.
    pub dependency_paths: Vec<PathBuf>,

    pub metadata: BTreeMap<String, Value>,
}

/// A registered artifact as stored by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub handle: RecordHandle,
    pub context: Context,
    pub name: String,
    pub path: PathBuf,
    pub version: u32,
    pub artifact_type: String,
    pub dependency_handles: Vec<RecordHandle>,
    pub dependency_paths: Vec<PathBuf>,
    pub metadata: BTreeMap<String, Value>,
    pub status: RecordStatus,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("no record with handle {0}")]
    RecordNotFound(RecordHandle),

    #[error("tracking backend error: {0}")]
    Backend(String),
}

/// The engine's view of an artifact tracking backend.
pub trait TrackingService {
    /// Active records registered under the given context and name. Used
    /// for conflict detection; deleted records are excluded.
    fn find_records(&self, context: &Context, name: &str)
        -> Result<Vec<ArtifactRecord>, TrackingError>;

    /// Register a new artifact, returning its handle.
    fn register_artifact(&mut self, spec: ArtifactSpec) -> Result<RecordHandle, TrackingError>;

    /// Mark a record deleted. Used by undo to compensate a registration.
    fn delete_record(&mut self, handle: RecordHandle) -> Result<(), TrackingError>;
}

/// In-memory tracking service.
#[derive(Debug, Default)]
pub struct MemoryTracking {
    records: BTreeMap<RecordHandle, ArtifactRecord>,
    next_handle: u64,
}

impl MemoryTracking {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, deleted ones included, in registration order.
    pub fn records(&self) -> impl Iterator<Item = &ArtifactRecord> {
        self.records.values()
    }

    pub fn record(&self, handle: RecordHandle) -> Option<&ArtifactRecord> {
        self.records.get(&handle)
    }
}

impl TrackingService for MemoryTracking {
    fn find_records(
        &self,
        context: &Context,
        name: &str,
    ) -> Result<Vec<ArtifactRecord>, TrackingError> {
        Ok(self
            .records
            .values()
            .filter(|r| {
                r.status == RecordStatus::Active && r.context.key == context.key && r.name == name
            })
            .cloned()
            .collect())
    }

    fn register_artifact(&mut self, spec: ArtifactSpec) -> Result<RecordHandle, TrackingError> {
        let handle = RecordHandle(self.next_handle);
        self.next_handle += 1;
        info!(
            handle = %handle,
            name = %spec.name,
            version = spec.version,
            context = %spec.context,
            "registered artifact"
        );
        self.records.insert(
            handle,
            ArtifactRecord {
                handle,
                context: spec.context,
                name: spec.name,
                path: spec.path,
                version: spec.version,
                artifact_type: spec.artifact_type,
                dependency_handles: spec.dependency_handles,
                dependency_paths: spec.dependency_paths,
                metadata: spec.metadata,
                status: RecordStatus::Active,
                registered_at: Utc::now(),
            },
        );
        Ok(handle)
    }

    fn delete_record(&mut self, handle: RecordHandle) -> Result<(), TrackingError> {
        let record = self
            .records
            .get_mut(&handle)
            .ok_or(TrackingError::RecordNotFound(handle))?;
        record.status = RecordStatus::Deleted;
        debug!(handle = %handle, name = %record.name, "deleted artifact record");
        Ok(())
    }
}

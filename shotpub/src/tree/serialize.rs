//! Tree persistence.
//!
//! The whole tree state round-trips through JSON: structure, contexts,
//! activation flags, properties, tasks and their resolved settings. A
//! loaded tree continues exactly where the saved one left off.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::item::PublishItem;
use super::PublishTree;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("failed to read tree file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write tree file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid tree data: {0}")]
    Format(#[from] serde_json::Error),
}

// On-disk shape. The arena is stored as-is, tombstones included, so item
// ids remain valid across a save/load cycle.
#[derive(Serialize, Deserialize)]
struct SerializedTree {
    items: Vec<Option<PublishItem>>,
    next_task_id: u64,
}

impl PublishTree {
    pub fn to_json(&self) -> Result<String, TreeError> {
        let serialized = SerializedTree {
            items: self.items.clone(),
            next_task_id: self.next_task_id,
        };
        Ok(serde_json::to_string_pretty(&serialized)?)
    }

    pub fn from_json(data: &str) -> Result<Self, TreeError> {
        let serialized: SerializedTree = serde_json::from_str(data)?;
        Ok(Self {
            items: serialized.items,
            next_task_id: serialized.next_task_id,
        })
    }

    pub fn save_file(&self, path: &Path) -> Result<(), TreeError> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| TreeError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), items = self.len(), "saved publish tree");
        Ok(())
    }

    pub fn load_file(path: &Path) -> Result<Self, TreeError> {
        let data = fs::read_to_string(path).map_err(|source| TreeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let tree = Self::from_json(&data)?;
        info!(path = %path.display(), items = tree.len(), "loaded publish tree");
        Ok(tree)
    }
}

//! Environment-level setting overrides.
//!
//! The environment layer carries the studio's per-context configuration:
//! for each context key, a map of plugin id to setting overrides applied
//! between the plugin's schema defaults and its item-type overrides. The
//! pseudo-context `"*"` supplies overrides for every context that has no
//! entry of its own.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::settings::Value;

/// Plugin id reserved for collector overrides in environment files.
pub const COLLECTOR_PLUGIN_KEY: &str = "collector";

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("failed to read environment file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid environment data: {0}")]
    Format(#[from] serde_json::Error),
}

/// Context key -> plugin id -> setting overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentSettings {
    #[serde(flatten)]
    contexts: BTreeMap<String, BTreeMap<String, BTreeMap<String, Value>>>,
}

impl EnvironmentSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_file(path: &Path) -> Result<Self, EnvironmentError> {
        let data = fs::read_to_string(path).map_err(|source| EnvironmentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let environment: Self = serde_json::from_str(&data)?;
        info!(
            path = %path.display(),
            contexts = environment.contexts.len(),
            "loaded environment settings"
        );
        Ok(environment)
    }

    /// Insert overrides for one (context, plugin) pair.
    pub fn set_overrides(
        &mut self,
        context_key: impl Into<String>,
        plugin_id: impl Into<String>,
        overrides: BTreeMap<String, Value>,
    ) {
        self.contexts
            .entry(context_key.into())
            .or_default()
            .insert(plugin_id.into(), overrides);
    }

    /// Overrides for a plugin under the given context, falling back to
    /// the `"*"` entry when the context has none.
    pub fn overrides_for(
        &self,
        context_key: Option<&str>,
        plugin_id: &str,
    ) -> Option<&BTreeMap<String, Value>> {
        if let Some(key) = context_key {
            if let Some(overrides) = self.contexts.get(key).and_then(|c| c.get(plugin_id)) {
                return Some(overrides);
            }
        }
        self.contexts.get("*").and_then(|c| c.get(plugin_id))
    }
}

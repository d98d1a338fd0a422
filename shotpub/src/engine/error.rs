//! Engine-level errors.
//!
//! Per-task failures during the execution passes are never errors at
//! this level; they are recorded in the pass report and the run carries
//! on. An [`EngineError`] means the run itself could not proceed.

use thiserror::Error;

use crate::plugin::PluginError;
use crate::settings::SettingsError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid name filter: {0}")]
    Filter(#[from] glob::PatternError),

    #[error("collection failed: {0}")]
    Collection(#[source] PluginError),

    #[error("settings resolution failed for plugin '{plugin}': {source}")]
    Settings {
        plugin: String,
        #[source]
        source: SettingsError,
    },

    #[error("task references unknown plugin '{0}'")]
    UnknownPlugin(String),
}

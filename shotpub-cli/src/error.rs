//! CLI error types.

use std::fmt;

use shotpub::engine::{EngineError, EnvironmentError};
use shotpub::tree::TreeError;

/// Errors surfaced to the CLI user.
#[derive(Debug)]
pub enum CliError {
    /// Configuration problem (bad flag value, unreadable config file).
    Config(String),

    /// Loading or saving a publish tree file failed.
    Tree(TreeError),

    /// Loading the environment settings file failed.
    Environment(EnvironmentError),

    /// The engine could not run.
    Engine(EngineError),

    /// The run completed but one or more tasks failed.
    PublishFailed { failures: usize },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "configuration error: {}", msg),
            CliError::Tree(e) => write!(f, "tree error: {}", e),
            CliError::Environment(e) => write!(f, "environment error: {}", e),
            CliError::Engine(e) => write!(f, "engine error: {}", e),
            CliError::PublishFailed { failures } => {
                write!(f, "publish run failed: {} task(s) did not complete", failures)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Tree(e) => Some(e),
            CliError::Environment(e) => Some(e),
            CliError::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TreeError> for CliError {
    fn from(e: TreeError) -> Self {
        CliError::Tree(e)
    }
}

impl From<EnvironmentError> for CliError {
    fn from(e: EnvironmentError) -> Self {
        CliError::Environment(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

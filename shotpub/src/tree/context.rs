//! Production-hierarchy context tokens.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::settings::Value;

/// Identifies where in the production hierarchy an item belongs.
///
/// The key is opaque to the engine; it is supplied by the surrounding
/// pipeline and used verbatim when querying the tracking service. The
/// field map is the context "expressed as fields" for template rendering
/// (for example `project`, `shot`, `step`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub key: String,
    pub fields: BTreeMap<String, Value>,
}

impl Context {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field attachment.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

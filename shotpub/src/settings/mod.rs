//! Layered plugin configuration.
//!
//! Every plugin declares a [`SettingsSchema`] describing the settings it
//! expects. At task-creation time the engine resolves that schema into a
//! single flattened [`ResolvedSettings`] view by layering four sources,
//! narrowest scope winning:
//!
//! 1. schema defaults
//! 2. environment overrides (keyed by production context)
//! 3. per-item-type overrides declared by the plugin
//! 4. per-task runtime overrides
//!
//! Dictionary-valued fragments merge recursively rather than replacing
//! wholesale, so an item-type override can add nested keys (for example
//! extra fields on a template setting) without restating the whole value.
//!
//! Template-typed settings additionally carry a field map resolved from
//! the item's context and cached fields; rendering a path through the
//! [`TemplateRegistry`] fails explicitly when required fields are missing
//! rather than substituting a placeholder silently.

mod error;
mod resolve;
mod schema;
mod template;
mod value;

pub use error::SettingsError;
pub use resolve::{resolve_settings, resolve_template_fields, ResolvedSettings, Setting};
pub use schema::{SettingSpec, SettingsSchema};
pub use template::{FieldValue, PathTemplate, TemplateRegistry, TemplateSetting};
pub use value::{merge_value, SettingType, Value};

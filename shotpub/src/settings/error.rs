//! Error types for settings resolution.

use thiserror::Error;

use super::value::SettingType;

/// Errors raised while resolving plugin settings.
///
/// [`SettingsError::MissingTemplate`] and
/// [`SettingsError::MissingTemplateKeys`] are deliberately distinct: the
/// first means the configuration references a pattern that does not exist,
/// the second that a known pattern cannot be rendered because required
/// fields stayed unresolved after merging.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// A referenced pattern name does not exist in the pattern registry.
    #[error("template '{0}' does not exist in the pattern registry")]
    MissingTemplate(String),

    /// Required template fields remain unresolved after merging.
    #[error("cannot resolve template '{template}': missing fields {missing:?}")]
    MissingTemplateKeys {
        template: String,
        missing: Vec<String>,
    },

    /// A setting value does not match its declared type.
    #[error("setting '{name}' expects {expected} but got '{actual}'")]
    TypeMismatch {
        name: String,
        expected: SettingType,
        actual: String,
    },

    /// A setting name is not declared in the schema.
    #[error("unknown setting '{0}'")]
    UnknownSetting(String),
}

//! Named path patterns and template-typed settings.
//!
//! Path templates are consumed, not re-specified: a pattern is a plain
//! string with `{field}` tokens (optionally `{field:0N}` for zero-padded
//! integers) registered under a name. Template-typed settings reference a
//! pattern by name and carry the field values used to render it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::SettingsError;
use super::value::Value;

fn token_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_]+)(?::0(\d+))?\}").unwrap())
}

/// One resolved (or unresolved) template field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// A concrete value.
    Value(Value),

    /// Required by the pattern but absent from every source.
    Missing,

    /// Values disagree when aggregating across several items or tasks.
    /// Only meaningful to aggregated views; rendering treats it like
    /// [`FieldValue::Missing`].
    MultipleValues,
}

/// A template-typed setting: a pattern name plus its field sub-mapping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemplateSetting {
    /// Name of the pattern in the registry. `None` means the setting is
    /// allowed to stay empty (publish-in-place, for example).
    pub template: Option<String>,

    /// Field name to resolved value.
    pub fields: BTreeMap<String, FieldValue>,
}

impl TemplateSetting {
    /// A template setting referencing a pattern by name with no fields
    /// resolved yet.
    pub fn named(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
            fields: BTreeMap::new(),
        }
    }

    /// Set one field value.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), FieldValue::Value(value));
    }

    /// Fold another view of the same setting into this one, marking any
    /// disagreeing fields as [`FieldValue::MultipleValues`].
    pub fn merge_view(&mut self, other: &TemplateSetting) {
        for (name, theirs) in &other.fields {
            match self.fields.get(name) {
                Some(ours) if ours == theirs => {}
                Some(_) => {
                    self.fields
                        .insert(name.clone(), FieldValue::MultipleValues);
                }
                None => {
                    self.fields.insert(name.clone(), theirs.clone());
                }
            }
        }
    }

    /// Render this setting into a concrete path.
    ///
    /// Returns `Ok(None)` when no pattern name is set (an intentionally
    /// empty template setting).
    ///
    /// # Errors
    ///
    /// [`SettingsError::MissingTemplate`] if the named pattern is not
    /// registered; [`SettingsError::MissingTemplateKeys`] if any required
    /// field is missing or ambiguous.
    pub fn resolve_path(
        &self,
        registry: &TemplateRegistry,
    ) -> Result<Option<PathBuf>, SettingsError> {
        let Some(name) = &self.template else {
            return Ok(None);
        };
        let pattern = registry.get(name)?;
        pattern.apply(&self.fields).map(Some)
    }
}

/// A named path pattern with substitutable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTemplate {
    pub name: String,
    pub pattern: String,
}

impl PathTemplate {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }

    /// Names of all fields referenced by the pattern.
    pub fn required_fields(&self) -> Vec<String> {
        token_regex()
            .captures_iter(&self.pattern)
            .map(|caps| caps.get(1).unwrap().as_str().to_string())
            .collect()
    }

    /// Substitute fields into the pattern.
    ///
    /// A field whose value is missing or ambiguous fails resolution; the
    /// error names every unresolved field so the caller can present
    /// actionable remediation.
    pub fn apply(&self, fields: &BTreeMap<String, FieldValue>) -> Result<PathBuf, SettingsError> {
        let mut missing = Vec::new();
        let mut rendered = String::new();
        let mut last_end = 0;

        for caps in token_regex().captures_iter(&self.pattern) {
            let token = caps.get(0).unwrap();
            let field = caps.get(1).unwrap().as_str();
            let padding: Option<usize> = caps.get(2).map(|m| m.as_str().parse().unwrap());

            rendered.push_str(&self.pattern[last_end..token.start()]);
            last_end = token.end();

            match fields.get(field) {
                Some(FieldValue::Value(value)) if !value.is_null() => {
                    match (padding, value) {
                        (Some(width), Value::Int(n)) => {
                            rendered.push_str(&format!("{:0width$}", n, width = width));
                        }
                        (_, value) => rendered.push_str(&value.to_string()),
                    }
                }
                _ => {
                    // Each unresolved field is reported once, in pattern
                    // order, even when the pattern repeats it.
                    if !missing.iter().any(|m| m == field) {
                        missing.push(field.to_string());
                    }
                }
            }
        }
        rendered.push_str(&self.pattern[last_end..]);

        if !missing.is_empty() {
            return Err(SettingsError::MissingTemplateKeys {
                template: self.name.clone(),
                missing,
            });
        }

        Ok(PathBuf::from(rendered))
    }
}

/// Registry of named path patterns, loaded at configuration time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, PathTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from name/pattern pairs.
    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        let templates = map
            .into_iter()
            .map(|(name, pattern)| {
                let template = PathTemplate::new(name.clone(), pattern);
                (name, template)
            })
            .collect();
        Self { templates }
    }

    pub fn insert(&mut self, name: impl Into<String>, pattern: impl Into<String>) {
        let name = name.into();
        self.templates
            .insert(name.clone(), PathTemplate::new(name, pattern));
    }

    /// Look up a pattern by name.
    ///
    /// # Errors
    ///
    /// [`SettingsError::MissingTemplate`] if the name is not registered.
    pub fn get(&self, name: &str) -> Result<&PathTemplate, SettingsError> {
        self.templates
            .get(name)
            .ok_or_else(|| SettingsError::MissingTemplate(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, Value)]) -> BTreeMap<String, FieldValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::Value(v.clone())))
            .collect()
    }

    #[test]
    fn test_apply_substitutes_fields() {
        let template = PathTemplate::new("pub", "/proj/{shot}/pub/{name}.v{version:03}.{ext}");
        let path = template
            .apply(&fields(&[
                ("shot", Value::from("shotA")),
                ("name", Value::from("scene")),
                ("version", Value::Int(7)),
                ("ext", Value::from("ma")),
            ]))
            .unwrap();
        assert_eq!(path, PathBuf::from("/proj/shotA/pub/scene.v007.ma"));
    }

    #[test]
    fn test_apply_reports_missing_fields() {
        let template = PathTemplate::new("pub", "/proj/{shot}/{name}.{ext}");
        let err = template
            .apply(&fields(&[("shot", Value::from("shotA"))]))
            .unwrap_err();
        match err {
            SettingsError::MissingTemplateKeys { template, missing } => {
                assert_eq!(template, "pub");
                assert_eq!(missing, vec!["name".to_string(), "ext".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_apply_reports_repeated_missing_field_once() {
        let template = PathTemplate::new("pub", "/{shot}/{name}/{shot}.{ext}");
        let err = template
            .apply(&fields(&[("name", Value::from("scene"))]))
            .unwrap_err();
        match err {
            SettingsError::MissingTemplateKeys { missing, .. } => {
                assert_eq!(missing, vec!["shot".to_string(), "ext".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_apply_treats_multiple_values_as_missing() {
        let template = PathTemplate::new("pub", "/proj/{shot}");
        let mut map = BTreeMap::new();
        map.insert("shot".to_string(), FieldValue::MultipleValues);
        assert!(template.apply(&map).is_err());
    }

    #[test]
    fn test_required_fields() {
        let template = PathTemplate::new("pub", "/{a}/{b:04}/{a}");
        assert_eq!(template.required_fields(), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_registry_missing_template() {
        let registry = TemplateRegistry::new();
        let err = registry.get("nope").unwrap_err();
        assert_eq!(err, SettingsError::MissingTemplate("nope".to_string()));
    }

    #[test]
    fn test_resolve_path_empty_template_is_none() {
        let setting = TemplateSetting::default();
        let registry = TemplateRegistry::new();
        assert_eq!(setting.resolve_path(&registry).unwrap(), None);
    }

    #[test]
    fn test_merge_view_marks_disagreements() {
        let mut a = TemplateSetting::named("pub");
        a.set_field("shot", Value::from("shotA"));
        a.set_field("ext", Value::from("ma"));

        let mut b = TemplateSetting::named("pub");
        b.set_field("shot", Value::from("shotB"));
        b.set_field("ext", Value::from("ma"));

        a.merge_view(&b);
        assert_eq!(a.fields.get("shot"), Some(&FieldValue::MultipleValues));
        assert_eq!(
            a.fields.get("ext"),
            Some(&FieldValue::Value(Value::from("ma")))
        );
    }
}

//! Layered settings resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::SettingsError;
use super::schema::SettingsSchema;
use super::template::{FieldValue, TemplateRegistry};
use super::value::{merge_value, SettingType, Value};

/// One fully-resolved setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub name: String,
    pub setting_type: SettingType,
    pub default: Value,
    pub value: Value,
}

impl Setting {
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The resolved value, falling back to the declared default when the
    /// value is null.
    pub fn value_or_default(&self) -> &Value {
        if self.value.is_null() {
            &self.default
        } else {
            &self.value
        }
    }
}

/// The flattened settings view handed to a plugin for one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSettings {
    settings: BTreeMap<String, Setting>,
}

impl ResolvedSettings {
    pub fn get(&self, name: &str) -> Option<&Setting> {
        self.settings.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Setting> {
        self.settings.get_mut(name)
    }

    /// Like [`ResolvedSettings::get`] but failing loudly on a name the
    /// schema never declared.
    pub fn require(&self, name: &str) -> Result<&Setting, SettingsError> {
        self.settings
            .get(name)
            .ok_or_else(|| SettingsError::UnknownSetting(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Setting)> {
        self.settings.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

/// Resolve a plugin's schema into a single settings view.
///
/// Four layers are merged in order, narrowest scope last:
/// schema defaults, environment overrides for the execution context,
/// the plugin's per-item-type overrides, and per-task runtime overrides.
/// Dictionary fragments merge recursively throughout ([`merge_value`]),
/// so applying the override layers sequentially or as one combined patch
/// yields identical results.
///
/// Resolution is a pure function of its inputs: resolving twice with the
/// same arguments produces identical output.
///
/// # Errors
///
/// Returns [`SettingsError::TypeMismatch`] when a merged value does not
/// match (and cannot be coerced to) the declared type.
pub fn resolve_settings(
    schema: &SettingsSchema,
    environment: Option<&BTreeMap<String, Value>>,
    item_type: Option<&str>,
    runtime: Option<&BTreeMap<String, Value>>,
) -> Result<ResolvedSettings, SettingsError> {
    let item_type_overrides = item_type.map(|t| schema.overrides_for(t));

    let mut settings = BTreeMap::new();
    for (name, spec) in &schema.settings {
        let mut value = spec.default.clone();

        if let Some(overlay) = environment.and_then(|env| env.get(name)) {
            merge_value(&mut value, overlay);
        }
        if let Some(overlay) = item_type_overrides.as_ref().and_then(|o| o.get(name)) {
            merge_value(&mut value, overlay);
        }
        if let Some(overlay) = runtime.and_then(|r| r.get(name)) {
            merge_value(&mut value, overlay);
        }

        let value = spec.setting_type.coerce(name, value)?;
        settings.insert(
            name.clone(),
            Setting {
                name: name.clone(),
                setting_type: spec.setting_type,
                default: spec.default.clone(),
                value,
            },
        );
    }

    // Override keys that the schema never declared are ignored rather
    // than invented as settings; surface them for debugging.
    for source in [environment, runtime].into_iter().flatten() {
        for name in source.keys() {
            if !settings.contains_key(name) {
                debug!(setting = %name, "ignoring override for undeclared setting");
            }
        }
    }

    Ok(ResolvedSettings { settings })
}

/// Resolve the field sub-mappings of every template-typed setting.
///
/// Field values are pulled from the item's cached fields first, then the
/// context fields (context wins on disagreement, matching how a context
/// reassignment is expected to re-drive paths). Fields required by the
/// named pattern but absent from both sources are marked
/// [`FieldValue::Missing`].
///
/// A setting that references a pattern name the registry does not know is
/// left unresolved, with its fields untouched. The bad reference surfaces
/// when the setting is rendered, so one misconfigured setting never takes
/// down the rest of the resolution.
pub fn resolve_template_fields(
    settings: &mut ResolvedSettings,
    registry: &TemplateRegistry,
    context_fields: &BTreeMap<String, Value>,
    item_fields: &BTreeMap<String, Value>,
) {
    for setting in settings.settings.values_mut() {
        let Value::Template(template_setting) = &mut setting.value else {
            continue;
        };
        let Some(name) = template_setting.template.clone() else {
            continue;
        };

        let pattern = match registry.get(&name) {
            Ok(pattern) => pattern,
            Err(err) => {
                warn!(setting = %setting.name, error = %err, "leaving template setting unresolved");
                continue;
            }
        };

        for field in pattern.required_fields() {
            if let Some(value) = context_fields.get(&field) {
                template_setting
                    .fields
                    .insert(field, FieldValue::Value(value.clone()));
            } else if let Some(value) = item_fields.get(&field) {
                template_setting
                    .fields
                    .insert(field, FieldValue::Value(value.clone()));
            } else {
                template_setting
                    .fields
                    .entry(field)
                    .or_insert(FieldValue::Missing);
            }
        }
    }
}

//! Declarative settings schemas.

use std::collections::BTreeMap;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use super::value::{merge_value, SettingType, Value};

/// Declaration of a single setting: its type, default, and description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingSpec {
    pub setting_type: SettingType,
    pub default: Value,
    pub description: String,
}

impl SettingSpec {
    pub fn new(setting_type: SettingType, default: Value, description: impl Into<String>) -> Self {
        Self {
            setting_type,
            default,
            description: description.into(),
        }
    }
}

/// A plugin's declared settings plus its per-item-type overrides.
///
/// Schemas compose by override-merge: an item-type fragment only restates
/// the pieces it changes, and those pieces merge recursively into the
/// broader declaration during resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsSchema {
    /// Setting name to declaration.
    pub settings: BTreeMap<String, SettingSpec>,

    /// Item type tag (exact or glob) to setting-name/value override
    /// fragments.
    pub item_type_overrides: BTreeMap<String, BTreeMap<String, Value>>,
}

impl SettingsSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a setting. Builder style, consumes and returns self.
    pub fn with_setting(
        mut self,
        name: impl Into<String>,
        setting_type: SettingType,
        default: Value,
        description: impl Into<String>,
    ) -> Self {
        self.settings
            .insert(name.into(), SettingSpec::new(setting_type, default, description));
        self
    }

    /// Declare an override fragment for one setting under one item type.
    pub fn with_item_type_override(
        mut self,
        item_type: impl Into<String>,
        setting: impl Into<String>,
        value: Value,
    ) -> Self {
        self.item_type_overrides
            .entry(item_type.into())
            .or_default()
            .insert(setting.into(), value);
        self
    }

    /// Collect the override fragments applying to the given item type.
    ///
    /// An exact key match is applied after any glob matches so the most
    /// specific declaration wins; glob matches apply in key order, which
    /// keeps resolution deterministic.
    pub fn overrides_for(&self, item_type: &str) -> BTreeMap<String, Value> {
        let mut merged: BTreeMap<String, Value> = BTreeMap::new();

        for (key, fragment) in &self.item_type_overrides {
            if key == item_type {
                continue;
            }
            let matches = Pattern::new(key)
                .map(|p| p.matches(item_type))
                .unwrap_or(false);
            if matches {
                apply_fragment(&mut merged, fragment);
            }
        }

        if let Some(fragment) = self.item_type_overrides.get(item_type) {
            apply_fragment(&mut merged, fragment);
        }

        merged
    }
}

fn apply_fragment(merged: &mut BTreeMap<String, Value>, fragment: &BTreeMap<String, Value>) {
    for (name, value) in fragment {
        match merged.get_mut(name) {
            Some(existing) => merge_value(existing, value),
            None => {
                merged.insert(name.clone(), value.clone());
            }
        }
    }
}

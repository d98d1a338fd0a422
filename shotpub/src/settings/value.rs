//! The tagged-union setting value type and recursive merge.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::SettingsError;
use super::template::TemplateSetting;

/// A dynamically-typed setting or property value.
///
/// This is the exhaustive set of value shapes that may appear in plugin
/// settings, item properties, and the persisted publish tree. Using a
/// closed enum keeps merge and coercion logic statically checkable.
///
/// Serialization is untagged, so values read and write as natural JSON.
/// `Template` must stay declared ahead of `Dict`: a template setting is
/// also a valid map, and untagged deserialization takes the first variant
/// that fits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Template(TemplateSetting),
    Dict(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Dict(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_template(&self) -> Option<&TemplateSetting> {
        match self {
            Value::Template(v) => Some(v),
            _ => None,
        }
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Template(_) => "template",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
            Value::List(v) => {
                let parts: Vec<String> = v.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Dict(v) => {
                let parts: Vec<String> = v.iter().map(|(k, e)| format!("{}: {}", k, e)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Template(v) => write!(f, "template({})", v.template.as_deref().unwrap_or("-")),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Dict(v)
    }
}

/// Merge `overlay` into `base`.
///
/// Dictionaries merge recursively, child keys overriding parent keys at
/// the same path. Template settings merge their field maps the same way.
/// Any other combination replaces `base` wholesale. This is the single
/// merge primitive used by every layer of settings resolution, so merge
/// grouping cannot change the outcome - only scope order matters.
pub fn merge_value(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Dict(base_map), Value::Dict(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => merge_value(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (Value::Template(base_tmpl), Value::Template(overlay_tmpl)) => {
            if overlay_tmpl.template.is_some() {
                base_tmpl.template = overlay_tmpl.template.clone();
            }
            for (field, value) in &overlay_tmpl.fields {
                base_tmpl.fields.insert(field.clone(), value.clone());
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Declared type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingType {
    Bool,
    Int,
    Float,
    Str,
    List,
    Dict,
    Template,
}

impl SettingType {
    /// Check and coerce a merged value against this declared type.
    ///
    /// `Null` is always accepted (an unset optional setting). The only
    /// coercions performed are int-to-float widening and naming a template
    /// by a bare string.
    pub fn coerce(&self, name: &str, value: Value) -> Result<Value, SettingsError> {
        let ok = match (self, &value) {
            (_, Value::Null) => true,
            (SettingType::Bool, Value::Bool(_)) => true,
            (SettingType::Int, Value::Int(_)) => true,
            (SettingType::Float, Value::Float(_)) => true,
            (SettingType::Str, Value::Str(_)) => true,
            (SettingType::List, Value::List(_)) => true,
            (SettingType::Dict, Value::Dict(_)) => true,
            (SettingType::Template, Value::Template(_)) => true,
            _ => false,
        };
        if ok {
            return Ok(value);
        }

        match (self, value) {
            (SettingType::Float, Value::Int(v)) => Ok(Value::Float(v as f64)),
            (SettingType::Template, Value::Str(v)) => {
                Ok(Value::Template(TemplateSetting::named(v)))
            }
            (_, value) => Err(SettingsError::TypeMismatch {
                name: name.to_string(),
                expected: *self,
                actual: value.type_name().to_string(),
            }),
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettingType::Bool => "bool",
            SettingType::Int => "int",
            SettingType::Float => "float",
            SettingType::Str => "str",
            SettingType::List => "list",
            SettingType::Dict => "dict",
            SettingType::Template => "template",
        };
        write!(f, "{}", name)
    }
}

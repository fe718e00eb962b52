//! Deployment target records.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mapping::PathMapping;

/// Backend-specific target settings (everything besides the well-known fields).
pub type Settings = serde_json::Map<String, Value>;

/// A configured deployment destination or composition rule.
///
/// The `type` tag selects the plugin(s) that handle the target. Everything
/// that is not a well-known field lands in [`Target::settings`] and is
/// interpreted by the plugin.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct Target {
    /// Display name used for name-based resolution.
    #[builder(default, setter(into, strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Type tag selecting the plugin.
    #[serde(rename = "type")]
    pub kind: String,

    /// Position in the configured target list.
    #[builder(default)]
    #[serde(skip)]
    pub index: usize,

    /// Path rewrite rules applied before files reach this target.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<PathMapping>,

    /// Packages for which this target is hidden.
    #[builder(default)]
    #[serde(default, alias = "hideIf", skip_serializing_if = "Vec::is_empty")]
    pub hide_if: Vec<String>,

    /// Packages for which this target is shown (empty means all).
    #[builder(default)]
    #[serde(default, alias = "showIf", skip_serializing_if = "Vec::is_empty")]
    pub show_if: Vec<String>,

    /// Backend-specific settings.
    #[builder(default)]
    #[serde(flatten)]
    pub settings: Settings,
}

impl TargetBuilder {
    /// Set a single backend setting.
    pub fn setting(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.settings
            .get_or_insert_with(Settings::new)
            .insert(key.into(), value.into());
        self
    }

    fn validate(&self) -> Result<(), String> {
        match self.kind {
            Some(ref kind) if !kind.trim().is_empty() => Ok(()),
            Some(_) => Err("Target type cannot be empty".to_string()),
            None => Err("Target type is required".to_string()),
        }
    }
}

impl Target {
    /// Create a new target builder.
    pub fn builder() -> TargetBuilder {
        TargetBuilder::default()
    }

    /// Create an unnamed target of the given type.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            name: None,
            kind: kind.into(),
            index: 0,
            mappings: Vec::new(),
            hide_if: Vec::new(),
            show_if: Vec::new(),
            settings: Settings::new(),
        }
    }

    /// Name shown to users; unnamed targets get `(Target #N)` with a 1-based index.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("(Target #{})", self.index + 1),
        }
    }

    /// Normalized name used for identity comparisons.
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.display_name())
    }

    /// Normalized type tag.
    pub fn normalized_kind(&self) -> String {
        normalize_name(&self.kind)
    }

    /// Get a raw setting.
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// Get the first present setting among several spellings.
    pub fn first_setting(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|key| self.settings.get(*key))
    }

    /// Get a non-empty string setting.
    pub fn str_setting(&self, key: &str) -> Option<&str> {
        self.setting(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Get a boolean setting, accepting `true`/`false` strings as well.
    pub fn bool_setting(&self, keys: &[&str], default: bool) -> bool {
        match self.first_setting(keys) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => true,
                "false" | "no" | "0" => false,
                _ => default,
            },
            _ => default,
        }
    }

    /// Get a setting that may be a single string or a list of strings.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.setting(key).map(value_to_string_list).unwrap_or_default()
    }

    /// Produce a new target with `overrides` deep-merged on top.
    ///
    /// `name` and `type` keys replace the well-known fields; every other key
    /// is merged into the settings. The receiver is left untouched.
    pub fn with_overrides(&self, overrides: &Settings) -> Target {
        let mut target = self.clone();
        for (key, value) in overrides {
            match (key.as_str(), value) {
                ("name", Value::String(name)) => target.name = Some(name.clone()),
                ("type", Value::String(kind)) => target.kind = kind.clone(),
                _ => merge_value(
                    target.settings.entry(key.clone()).or_insert(Value::Null),
                    value,
                ),
            }
        }
        target
    }

    /// Whether the target should be offered for the given package.
    pub fn is_visible_for(&self, package: Option<&str>) -> bool {
        let Some(package) = package.map(normalize_name) else {
            return true;
        };

        if self.hide_if.iter().any(|p| normalize_name(p) == package) {
            return false;
        }

        self.show_if.is_empty() || self.show_if.iter().any(|p| normalize_name(p) == package)
    }
}

/// Normalize a target or type name for comparisons (trim + lowercase).
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Interpret a JSON value as a list of non-empty strings.
pub fn value_to_string_list(value: &Value) -> Vec<String> {
    fn item(value: &Value) -> Option<String> {
        let s = match value {
            Value::Null => return None,
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        };
        (!s.is_empty()).then_some(s)
    }

    match value {
        Value::Array(items) => items.iter().filter_map(item).collect(),
        other => item(other).into_iter().collect(),
    }
}

fn merge_value(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_value(base.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

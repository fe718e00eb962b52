//! Placeholder values (`${name}`) substituted into target settings.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\s*([^}]+?)\s*\}").expect("placeholder pattern is valid"));

/// Named values available to `${name}` placeholders.
///
/// `${env:VAR}` reads from the process environment. Unknown placeholders are
/// left verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(BTreeMap<String, String>);

impl Values {
    /// Create an empty value set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add or replace a value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Look up a value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Number of named values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no named values.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace all placeholders in `text`.
    pub fn replace(&self, text: &str) -> String {
        PLACEHOLDER
            .replace_all(text, |caps: &Captures<'_>| {
                let key = &caps[1];
                let resolved = match key.strip_prefix("env:") {
                    Some(var) => std::env::var(var.trim()).ok(),
                    None => self.get(key).map(str::to_string),
                };
                resolved.unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Replace placeholders in every string inside a JSON value.
    pub fn replace_in_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.replace(s)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.replace_in_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.replace_in_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

impl FromIterator<(String, String)> for Values {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replace_known_and_unknown() {
        let values = Values::new().with("stage", "prod");
        assert_eq!(values.replace("/srv/${stage}/${ missing }"), "/srv/prod/${ missing }");
        assert_eq!(values.replace("${ stage }"), "prod");
    }

    #[test]
    fn test_replace_env() {
        let values = Values::new();
        if let Ok(path) = std::env::var("PATH") {
            assert_eq!(values.replace("${env:PATH}"), path);
        }
        assert_eq!(
            values.replace("${env:SHIPWRIGHT_UNSET_TEST_VAR}"),
            "${env:SHIPWRIGHT_UNSET_TEST_VAR}"
        );
    }

    #[test]
    fn test_replace_in_value() {
        let values = Values::new().with("host", "example.com");
        let replaced = values.replace_in_value(&json!({"a": ["${host}", 1], "b": "x"}));
        assert_eq!(replaced, json!({"a": ["example.com", 1], "b": "x"}));
    }
}

use std::fmt;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Concrete value of one resolved setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

/// Ordered mapping from setting name to its resolved value.
pub type ResolvedSettings = IndexMap<String, SettingValue>;

impl SettingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            SettingValue::List(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// Canonical option key for scalar values; lists have none.
    pub fn option_key(&self) -> Option<String> {
        match self {
            SettingValue::Bool(value) => Some(value.to_string()),
            SettingValue::Int(value) => Some(value.to_string()),
            SettingValue::Str(value) => Some(value.clone()),
            SettingValue::List(_) => None,
        }
    }

    /// Returns true when the value equals the given option key.
    ///
    /// Scalars compare through their canonical key, so `true` matches the
    /// option `"true"` and `3` matches `"3"`. A list never equals an option.
    pub fn matches_option(&self, option: &str) -> bool {
        self.option_key().is_some_and(|key| key == option)
    }

    /// Convert an untyped JSON value into a setting value, if its shape fits.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(flag) => Some(SettingValue::Bool(*flag)),
            Value::Number(number) => number.as_i64().map(SettingValue::Int),
            Value::String(text) => Some(SettingValue::Str(text.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(SettingValue::List),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(value) => write!(f, "{value}"),
            SettingValue::Int(value) => write!(f, "{value}"),
            SettingValue::Str(value) => f.write_str(value),
            SettingValue::List(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Str(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Str(value)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(values: Vec<String>) -> Self {
        SettingValue::List(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_values_keep_their_types() {
        let json = r#"{"a": true, "b": 7, "c": "normal", "d": ["x", "y"]}"#;
        let parsed: ResolvedSettings = serde_json::from_str(json).expect("parse settings");
        assert_eq!(parsed["a"], SettingValue::Bool(true));
        assert_eq!(parsed["b"], SettingValue::Int(7));
        assert_eq!(parsed["c"], SettingValue::Str("normal".to_string()));
        assert_eq!(
            parsed["d"],
            SettingValue::List(vec!["x".to_string(), "y".to_string()])
        );
    }

    #[test]
    fn lists_never_match_scalar_options() {
        let list = SettingValue::List(vec!["true".to_string()]);
        assert!(!list.matches_option("true"));
        assert!(SettingValue::Bool(true).matches_option("true"));
        assert!(SettingValue::Int(3).matches_option("3"));
    }
}

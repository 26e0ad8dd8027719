use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::validation::validate_schema;
use crate::value::SettingValue;

/// Declared type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SettingType {
    Bool,
    Int,
    Str,
    List,
}

/// Targets that become inert when a disable rule holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Disables {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub settings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tabs: Vec<String>,
}

impl Disables {
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty() && self.sections.is_empty() && self.tabs.is_empty()
    }
}

/// One setting as published by the schema provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SettingInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    /// Canonical ordered options for `str` and `list` settings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
    /// Schema-internal settings are never randomized.
    #[serde(default = "default_true")]
    pub randomizable: bool,
    /// Disable spec keyed by option value; a leading `!` negates the match.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub disable: IndexMap<String, Disables>,
}

fn default_true() -> bool {
    true
}

impl SettingInfo {
    /// Convert a raw drawn option into the declared type.
    pub fn coerce(&self, raw: &str) -> Result<SettingValue> {
        let fail = || Error::Coercion {
            setting: self.name.clone(),
            value: raw.to_string(),
        };

        match self.setting_type {
            SettingType::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" => Ok(SettingValue::Bool(true)),
                "false" => Ok(SettingValue::Bool(false)),
                _ => Err(fail()),
            },
            SettingType::Int => {
                let value: i64 = raw.trim().parse().map_err(|_| fail())?;
                if self.minimum.is_some_and(|min| value < min)
                    || self.maximum.is_some_and(|max| value > max)
                {
                    return Err(fail());
                }
                Ok(SettingValue::Int(value))
            }
            SettingType::Str => {
                if self.choices.is_empty() || self.choices.iter().any(|choice| choice == raw) {
                    Ok(SettingValue::Str(raw.to_string()))
                } else {
                    Err(fail())
                }
            }
            SettingType::List => Err(fail()),
        }
    }

    /// Returns true when `option` is a legal categorical option.
    pub fn accepts_option(&self, option: &str) -> bool {
        self.coerce(option).is_ok()
    }

    /// Options enumerable without a range, in canonical order.
    pub fn option_names(&self) -> Vec<String> {
        match self.setting_type {
            SettingType::Bool => vec!["true".to_string(), "false".to_string()],
            SettingType::Int => match (self.minimum, self.maximum) {
                (Some(min), Some(max)) if max >= min => {
                    (min..=max).map(|value| value.to_string()).collect()
                }
                _ => Vec::new(),
            },
            SettingType::Str | SettingType::List => self.choices.clone(),
        }
    }

    /// Disable rules that hold for the given resolved value.
    pub fn active_disables<'a>(
        &'a self,
        value: &'a SettingValue,
    ) -> impl Iterator<Item = &'a Disables> + 'a {
        self.disable.iter().filter_map(move |(key, disables)| {
            let (negated, option) = match key.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, key.as_str()),
            };
            (value.matches_option(option) != negated).then_some(disables)
        })
    }
}

/// Item of a starting pool; a gated item is only eligible when the named
/// list setting contains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PoolItem {
    Name(String),
    Gated {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gated_by: Option<String>,
    },
}

impl PoolItem {
    pub fn name(&self) -> &str {
        match self {
            PoolItem::Name(name) => name,
            PoolItem::Gated { name, .. } => name,
        }
    }

    pub fn gated_by(&self) -> Option<&str> {
        match self {
            PoolItem::Name(_) => None,
            PoolItem::Gated { gated_by, .. } => gated_by.as_deref(),
        }
    }
}

/// Settings schema file published for one generator version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SettingsSchema {
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_version: Option<String>,
    pub settings: Vec<SettingInfo>,
    /// Starting pools keyed by the list setting they feed.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub starting_pools: IndexMap<String, Vec<PoolItem>>,
}

/// Read-only view of the settings schema used by the resolution engine.
pub trait SchemaProvider {
    fn setting(&self, name: &str) -> Option<&SettingInfo>;

    fn setting_names(&self) -> Vec<&str>;

    fn settings_in_section(&self, section: &str) -> Vec<&str>;

    fn settings_in_tab(&self, tab: &str) -> Vec<&str>;

    fn starting_pool(&self, pool: &str) -> Option<&[PoolItem]>;

    /// Starting pool names in schema order.
    fn starting_pool_names(&self) -> Vec<&str>;

    fn generator_version(&self) -> Option<&str> {
        None
    }

    /// Look up a setting, treating an unknown name as a contract violation.
    fn require(&self, name: &str) -> Result<&SettingInfo> {
        self.setting(name)
            .ok_or_else(|| Error::UnknownSetting(name.to_string()))
    }
}

/// Indexed, validated settings schema.
#[derive(Debug, Clone)]
pub struct SettingsCatalog {
    schema: SettingsSchema,
    by_name: HashMap<String, usize>,
    by_section: HashMap<String, Vec<usize>>,
    by_tab: HashMap<String, Vec<usize>>,
}

impl SettingsCatalog {
    pub fn new(schema: SettingsSchema) -> Result<Self> {
        validate_schema(&schema)?;

        let mut by_name = HashMap::new();
        let mut by_section: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_tab: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, setting) in schema.settings.iter().enumerate() {
            by_name.insert(setting.name.clone(), idx);
            if let Some(section) = &setting.section {
                by_section.entry(section.clone()).or_default().push(idx);
            }
            if let Some(tab) = &setting.tab {
                by_tab.entry(tab.clone()).or_default().push(idx);
            }
        }

        Ok(Self {
            schema,
            by_name,
            by_section,
            by_tab,
        })
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let schema: SettingsSchema = serde_json::from_str(contents)?;
        Self::new(schema)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn schema(&self) -> &SettingsSchema {
        &self.schema
    }

    pub fn settings(&self) -> &[SettingInfo] {
        &self.schema.settings
    }

    fn names_at(&self, indexes: Option<&Vec<usize>>) -> Vec<&str> {
        indexes
            .map(|indexes| {
                indexes
                    .iter()
                    .map(|idx| self.schema.settings[*idx].name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl SchemaProvider for SettingsCatalog {
    fn setting(&self, name: &str) -> Option<&SettingInfo> {
        self.by_name
            .get(name)
            .map(|idx| &self.schema.settings[*idx])
    }

    fn setting_names(&self) -> Vec<&str> {
        self.schema
            .settings
            .iter()
            .map(|setting| setting.name.as_str())
            .collect()
    }

    fn settings_in_section(&self, section: &str) -> Vec<&str> {
        self.names_at(self.by_section.get(section))
    }

    fn settings_in_tab(&self, tab: &str) -> Vec<&str> {
        self.names_at(self.by_tab.get(tab))
    }

    fn starting_pool(&self, pool: &str) -> Option<&[PoolItem]> {
        self.schema.starting_pools.get(pool).map(Vec::as_slice)
    }

    fn starting_pool_names(&self) -> Vec<&str> {
        self.schema
            .starting_pools
            .keys()
            .map(String::as_str)
            .collect()
    }

    fn generator_version(&self) -> Option<&str> {
        self.schema.generator_version.as_deref()
    }
}

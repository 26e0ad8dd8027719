use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::merge::OptionPatch;

/// Raw weights document as written on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WeightsDocument {
    /// Non-random directives. Keys prefixed `extra_` add to an existing value
    /// and keys prefixed `remove_` remove from it.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
    /// Ordered conditional rules, `name -> [enabled, params...]`.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub conditionals: IndexMap<String, ConditionalSpec>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub multiselect: IndexMap<String, MultiselectWeight>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub weights: IndexMap<String, WeightEntry>,
}

/// Entry under `weights`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum WeightEntry {
    /// Starting items seeded by an override (`starting_*` keys).
    Items(Vec<String>),
    /// Multiselect spec written inline with the weights.
    Multiselect(MultiselectSpec),
    /// Categorical option weights.
    Options(IndexMap<String, f64>),
}

/// Multiselect configuration for one list setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum MultiselectWeight {
    Spec(MultiselectSpec),
    /// Bare global enable percentage; the whole list is enabled or not.
    Percentage(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MultiselectSpec {
    pub global_enable_percentage: f64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub geometric: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_percentage: Option<IndexMap<String, f64>>,
}

impl MultiselectWeight {
    pub fn global_enable_percentage(&self) -> f64 {
        match self {
            MultiselectWeight::Spec(spec) => spec.global_enable_percentage,
            MultiselectWeight::Percentage(pct) => *pct,
        }
    }

    pub fn is_geometric(&self) -> bool {
        matches!(self, MultiselectWeight::Spec(spec) if spec.geometric)
    }

    pub fn opt_percentage(&self) -> Option<&IndexMap<String, f64>> {
        match self {
            MultiselectWeight::Spec(spec) => spec.opt_percentage.as_ref(),
            MultiselectWeight::Percentage(_) => None,
        }
    }
}

/// Conditional list entry as written: a bare flag or `[enabled, params...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ConditionalSpec {
    Flag(bool),
    List(Vec<Value>),
}

/// Normalized conditional entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalEntry {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
}

impl ConditionalEntry {
    pub fn new(enabled: bool, params: Vec<Value>) -> Self {
        Self { enabled, params }
    }
}

/// Effective weight table, ready for the resolution engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    pub weights: IndexMap<String, IndexMap<String, f64>>,
    pub multiselect: IndexMap<String, MultiselectWeight>,
    pub options: Map<String, Value>,
    pub conditionals: IndexMap<String, ConditionalEntry>,
    /// Extra starting items keyed by starting pool setting.
    pub start_with: IndexMap<String, Vec<String>>,
}

impl WeightTable {
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn option_i64(&self, key: &str) -> Option<i64> {
        self.options.get(key).and_then(Value::as_i64)
    }

    pub fn option_bool(&self, key: &str) -> Option<bool> {
        self.options.get(key).and_then(Value::as_bool)
    }

    /// Returns the conditional entry when the rule is present and enabled.
    pub fn enabled_conditional(&self, name: &str) -> Option<&ConditionalEntry> {
        self.conditionals.get(name).filter(|entry| entry.enabled)
    }
}

/// Override layer; option keys are kept as pending patches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightOverride {
    pub weights: IndexMap<String, IndexMap<String, f64>>,
    pub multiselect: IndexMap<String, MultiselectWeight>,
    pub options: IndexMap<String, OptionPatch>,
    pub conditionals: IndexMap<String, ConditionalEntry>,
    pub start_with: IndexMap<String, Vec<String>>,
}

use indexmap::IndexMap;
use plando_core::SchemaProvider;
use plando_roll::params::parse_split;
use plando_weights::{MultiselectWeight, WeightTable};
use serde::{Deserialize, Serialize};

use crate::errors::{BenchError, Result};

/// Dynamic win conditions and the option they force.
const DYNAMIC_WINCONS: &[(&str, &str)] = &[
    ("dynamic_skulltula_wincon", "tokens"),
    ("dynamic_heart_wincon", "hearts"),
];
/// Settings a dynamic win condition targets, in split order.
const WINCON_SETTINGS: &[&str] = &["bridge", "shuffle_ganon_bosskey"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    Categorical,
    Multiselect,
    /// Observed by list length rather than by option.
    Geometric,
}

/// Expected share of seeds for one option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedOption {
    /// Human label of the configured weight.
    pub weight: String,
    pub normalized_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingExpectation {
    pub kind: SettingKind,
    pub options: IndexMap<String, ExpectedOption>,
}

/// Normalized weights a perfect roller would reproduce.
pub fn expected_weights(
    table: &WeightTable,
    schema: &dyn SchemaProvider,
) -> Result<IndexMap<String, SettingExpectation>> {
    let mut expected = IndexMap::new();

    for (setting, options) in &table.weights {
        let mut rows: IndexMap<String, ExpectedOption> = IndexMap::new();
        let mut dynamic_share = 0.0;

        if let Some(split_index) = WINCON_SETTINGS.iter().position(|name| *name == setting.as_str()) {
            for (rule, option) in DYNAMIC_WINCONS {
                let Some(chance) = dynamic_chance(table, rule, split_index)? else {
                    continue;
                };
                rows.insert(
                    option.to_string(),
                    ExpectedOption {
                        weight: "dynamic".to_string(),
                        normalized_weight: chance,
                    },
                );
                dynamic_share += chance;
            }
        }

        let total: f64 = options.values().sum();
        for (option, weight) in options {
            if rows.contains_key(option) {
                continue;
            }
            let normalized_weight = if total > 0.0 {
                weight / total * (1.0 - dynamic_share)
            } else {
                0.0
            };
            rows.insert(
                option.clone(),
                ExpectedOption {
                    weight: format_number(*weight),
                    normalized_weight,
                },
            );
        }

        expected.insert(
            setting.clone(),
            SettingExpectation {
                kind: SettingKind::Categorical,
                options: rows,
            },
        );
    }

    for (setting, spec) in &table.multiselect {
        let choices = &schema.require(setting)?.choices;
        expected.insert(setting.clone(), multiselect_expectation(choices, spec));
    }

    Ok(expected)
}

/// Share of seeds where `rule` forces its option onto the target setting.
fn dynamic_chance(table: &WeightTable, rule: &str, split_index: usize) -> Result<Option<f64>> {
    let Some(entry) = table.enabled_conditional(rule) else {
        return Ok(None);
    };
    let chance = entry
        .params
        .first()
        .and_then(|value| value.as_f64())
        .ok_or_else(|| BenchError::InvalidInput(format!("{rule}: missing chance")))?;
    let split = entry
        .params
        .get(1)
        .and_then(|value| value.as_str())
        .and_then(parse_split)
        .filter(|split| split.len() == 3)
        .ok_or_else(|| BenchError::InvalidInput(format!("{rule}: split must be 'a/b/c'")))?;
    Ok(Some(
        chance / 100.0 * split[split_index] / 100.0 + chance / 100.0 * split[2] / 100.0,
    ))
}

fn multiselect_expectation(choices: &[String], spec: &MultiselectWeight) -> SettingExpectation {
    let global = spec.global_enable_percentage();
    let mut options = IndexMap::new();

    if spec.is_geometric() {
        let max = choices.len();
        for count in 0..=max {
            options.insert(
                count.to_string(),
                ExpectedOption {
                    weight: format!("{} (global {}%)", 1_u64 << (max - count), format_number(global)),
                    normalized_weight: 50.0 / 2_f64.powi(count as i32) / 100.0 * global / 100.0,
                },
            );
        }
        return SettingExpectation {
            kind: SettingKind::Geometric,
            options,
        };
    }

    for choice in choices {
        let pct = match spec.opt_percentage() {
            Some(percentages) => percentages.get(choice).copied().unwrap_or(0.0),
            None => 100.0,
        };
        options.insert(
            choice.clone(),
            ExpectedOption {
                weight: format!("{}% (global {}%)", format_number(pct), format_number(global)),
                normalized_weight: pct / 100.0 * global / 100.0,
            },
        );
    }
    SettingExpectation {
        kind: SettingKind::Multiselect,
        options,
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

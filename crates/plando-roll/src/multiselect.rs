use indexmap::IndexMap;
use plando_core::{SchemaProvider, SettingType};
use plando_weights::MultiselectWeight;
use rand::RngCore;

use crate::draw::{geometric_sample, roll_percentage};
use crate::errors::{Result, RollError};

/// Resolve every multiselect entry into the included options.
///
/// Non-randomizable list settings always resolve to an empty list.
pub fn resolve_multiselects(
    table: &IndexMap<String, MultiselectWeight>,
    schema: &dyn SchemaProvider,
    rng: &mut dyn RngCore,
) -> Result<IndexMap<String, Vec<String>>> {
    let mut resolved = IndexMap::new();

    for name in schema.setting_names() {
        let setting = schema.require(name)?;
        if setting.setting_type == SettingType::List && !setting.randomizable {
            resolved.insert(name.to_string(), Vec::new());
        }
    }

    for (name, spec) in table {
        let setting = schema.require(name)?;
        if !setting.randomizable {
            return Err(RollError::InvalidConfig(format!(
                "multiselect '{name}' is not randomizable"
            )));
        }
        let value = resolve_one(&setting.choices, spec, rng)?;
        resolved.insert(name.clone(), value);
    }

    Ok(resolved)
}

fn resolve_one(
    choices: &[String],
    spec: &MultiselectWeight,
    rng: &mut dyn RngCore,
) -> Result<Vec<String>> {
    if !roll_percentage(spec.global_enable_percentage(), rng) {
        return Ok(Vec::new());
    }

    if spec.is_geometric() {
        return geometric_sample(choices, rng);
    }

    if let Some(opt_percentage) = spec.opt_percentage() {
        return Ok(choices
            .iter()
            .filter(|choice| {
                let pct = opt_percentage.get(choice.as_str()).copied().unwrap_or(0.0);
                roll_percentage(pct, rng)
            })
            .cloned()
            .collect());
    }

    Ok(choices.to_vec())
}

use indexmap::IndexMap;
use plando_core::{SchemaProvider, SettingType};

use crate::model::WeightTable;

/// Build a table giving every option of every randomizable setting the same
/// weight.
///
/// List settings and the names in `excluded` are skipped; integer settings
/// are only included when their range is bounded.
pub fn balanced_weights(schema: &dyn SchemaProvider, excluded: &[String]) -> WeightTable {
    let mut table = WeightTable::default();

    for name in schema.setting_names() {
        if excluded.iter().any(|excluded| excluded == name) {
            continue;
        }
        let Some(setting) = schema.setting(name) else {
            continue;
        };
        if !setting.randomizable || setting.setting_type == SettingType::List {
            continue;
        }

        let options = setting.option_names();
        if options.is_empty() {
            continue;
        }
        let weight = 100.0 / options.len() as f64;
        let weights: IndexMap<String, f64> =
            options.into_iter().map(|option| (option, weight)).collect();
        table.weights.insert(name.to_string(), weights);
    }

    table
}

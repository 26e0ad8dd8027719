use plando_core::{SchemaProvider, SettingType};
use serde::Serialize;

use crate::model::{WeightEntry, WeightsDocument};

/// Option-level differences for one setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionDrift {
    pub setting: String,
    /// Options weighted in the file that the schema no longer offers.
    pub removed: Vec<String>,
    /// Options the schema offers that the file does not weight.
    pub added: Vec<String>,
}

/// Differences between a weights document and the settings schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    /// Settings in the file that the schema no longer knows.
    pub removed_settings: Vec<String>,
    /// Randomizable settings the file does not mention.
    pub new_settings: Vec<String>,
    pub options: Vec<OptionDrift>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.removed_settings.is_empty() && self.new_settings.is_empty() && self.options.is_empty()
    }
}

/// Compare a raw weights document against the schema without rejecting it.
///
/// Settings listed in `ignored` (range settings, literal lists) are not
/// reported as missing.
pub fn check_setting_drift(
    document: &WeightsDocument,
    schema: &dyn SchemaProvider,
    ignored: &[String],
) -> DriftReport {
    let mut report = DriftReport::default();

    for (name, entry) in &document.weights {
        let Some(setting) = schema.setting(name) else {
            if !matches!(entry, WeightEntry::Items(_)) {
                report.removed_settings.push(name.clone());
            }
            continue;
        };

        let WeightEntry::Options(options) = entry else {
            continue;
        };
        if !matches!(setting.setting_type, SettingType::Bool | SettingType::Str) {
            continue;
        }

        let known = setting.option_names();
        let removed: Vec<String> = options
            .keys()
            .filter(|option| !known.contains(option))
            .cloned()
            .collect();
        let added: Vec<String> = known
            .iter()
            .filter(|option| !options.contains_key(option.as_str()))
            .cloned()
            .collect();
        if !removed.is_empty() || !added.is_empty() {
            report.options.push(OptionDrift {
                setting: name.clone(),
                removed,
                added,
            });
        }
    }

    for name in document.multiselect.keys() {
        if schema.setting(name).is_none() {
            report.removed_settings.push(name.clone());
        }
    }

    for name in schema.setting_names() {
        let Some(setting) = schema.setting(name) else {
            continue;
        };
        let mentioned = document.weights.contains_key(name)
            || document.multiselect.contains_key(name)
            || ignored.iter().any(|ignored| ignored == name);
        if setting.randomizable && !mentioned && setting.setting_type != SettingType::List {
            report.new_settings.push(name.to_string());
        }
    }

    report
}

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::graph::build_disable_graph_report;
use crate::schema::{SettingType, SettingsSchema};

/// Validate internal consistency of a settings schema.
///
/// This checks:
/// - duplicate settings and duplicate choices
/// - integer bounds are ordered
/// - disable keys name legal options and disable targets exist
/// - starting pools feed list settings
/// - the disablement graph has no cycle
pub fn validate_schema(schema: &SettingsSchema) -> Result<()> {
    let mut catalog: BTreeMap<&str, SettingType> = BTreeMap::new();
    let mut sections = BTreeSet::new();
    let mut tabs = BTreeSet::new();

    for setting in &schema.settings {
        if catalog.insert(setting.name.as_str(), setting.setting_type).is_some() {
            return Err(Error::InvalidSchema(format!(
                "duplicate setting name: {}",
                setting.name
            )));
        }

        let mut choices = BTreeSet::new();
        for choice in &setting.choices {
            if !choices.insert(choice.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate choice {} for setting {}",
                    choice, setting.name
                )));
            }
        }

        if let (Some(min), Some(max)) = (setting.minimum, setting.maximum)
            && min > max
        {
            return Err(Error::InvalidSchema(format!(
                "minimum greater than maximum for setting {}",
                setting.name
            )));
        }

        if let Some(section) = &setting.section {
            sections.insert(section.as_str());
        }
        if let Some(tab) = &setting.tab {
            tabs.insert(tab.as_str());
        }
    }

    for setting in &schema.settings {
        for (key, disables) in &setting.disable {
            let option = key.strip_prefix('!').unwrap_or(key);
            if setting.setting_type != SettingType::List && !setting.accepts_option(option) {
                return Err(Error::InvalidSchema(format!(
                    "disable key {} is not an option of setting {}",
                    key, setting.name
                )));
            }

            for target in &disables.settings {
                if !catalog.contains_key(target.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "setting {} disables unknown setting {}",
                        setting.name, target
                    )));
                }
            }
            for section in &disables.sections {
                if !sections.contains(section.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "setting {} disables unknown section {}",
                        setting.name, section
                    )));
                }
            }
            for tab in &disables.tabs {
                if !tabs.contains(tab.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "setting {} disables unknown tab {}",
                        setting.name, tab
                    )));
                }
            }
        }
    }

    for (pool, items) in &schema.starting_pools {
        match catalog.get(pool.as_str()) {
            Some(SettingType::List) => {}
            Some(_) => {
                return Err(Error::InvalidSchema(format!(
                    "starting pool {pool} must feed a list setting"
                )));
            }
            None => {
                return Err(Error::InvalidSchema(format!(
                    "starting pool {pool} does not name a setting"
                )));
            }
        }

        for item in items {
            if let Some(gate) = item.gated_by()
                && catalog.get(gate) != Some(&SettingType::List)
            {
                return Err(Error::InvalidSchema(format!(
                    "pool item {} is gated by {gate}, which is not a list setting",
                    item.name()
                )));
            }
        }
    }

    let report = build_disable_graph_report(schema);
    if let Some(cycle) = report.cycle {
        return Err(Error::InvalidSchema(format!(
            "disablement cycle between: {}",
            cycle.join(", ")
        )));
    }

    Ok(())
}

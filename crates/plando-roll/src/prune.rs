use plando_core::{Disables, ResolvedSettings, SchemaProvider};

/// Remove settings made inert by another setting's resolved value.
///
/// One scan over a snapshot of the keys; a setting removed earlier in the scan
/// is skipped. Returns the removed names in removal order.
pub fn prune(settings: &mut ResolvedSettings, schema: &dyn SchemaProvider) -> Vec<String> {
    let mut removed = Vec::new();
    let snapshot: Vec<String> = settings.keys().cloned().collect();

    for name in snapshot {
        let Some(value) = settings.get(&name).cloned() else {
            continue;
        };
        let Some(setting) = schema.setting(&name) else {
            continue;
        };
        let targets: Vec<String> = setting
            .active_disables(&value)
            .flat_map(|disables| disabled_names(disables, schema))
            .filter(|target| *target != name)
            .collect();
        for target in targets {
            if settings.shift_remove(&target).is_some() {
                removed.push(target);
            }
        }
    }

    removed
}

fn disabled_names(disables: &Disables, schema: &dyn SchemaProvider) -> Vec<String> {
    let mut names: Vec<String> = disables.settings.clone();
    for section in &disables.sections {
        names.extend(
            schema
                .settings_in_section(section)
                .into_iter()
                .map(str::to_string),
        );
    }
    for tab in &disables.tabs {
        names.extend(schema.settings_in_tab(tab).into_iter().map(str::to_string));
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use plando_core::{SettingInfo, SettingType, SettingValue, SettingsCatalog, SettingsSchema};

    fn setting(name: &str, setting_type: SettingType) -> SettingInfo {
        SettingInfo {
            name: name.to_string(),
            setting_type,
            choices: Vec::new(),
            minimum: None,
            maximum: None,
            section: None,
            tab: None,
            randomizable: true,
            disable: IndexMap::new(),
        }
    }

    fn catalog() -> SettingsCatalog {
        let mut hunt = setting("triforce_hunt", SettingType::Bool);
        hunt.disable.insert(
            "false".to_string(),
            Disables {
                settings: vec!["triforce_goal_per_world".to_string()],
                ..Disables::default()
            },
        );
        let mut bridge = setting("bridge", SettingType::Str);
        bridge.choices = vec!["open".to_string(), "tokens".to_string()];
        bridge.disable.insert(
            "!tokens".to_string(),
            Disables {
                settings: vec!["bridge_tokens".to_string()],
                ..Disables::default()
            },
        );
        let mut logic = setting("logic_rules", SettingType::Str);
        logic.choices = vec!["glitchless".to_string(), "no_logic".to_string()];
        logic.disable.insert(
            "no_logic".to_string(),
            Disables {
                tabs: vec!["logic_tab".to_string()],
                ..Disables::default()
            },
        );
        let mut tricks = setting("allowed_tricks", SettingType::List);
        tricks.tab = Some("logic_tab".to_string());
        let mut goal = setting("triforce_goal_per_world", SettingType::Int);
        goal.minimum = Some(1);
        goal.maximum = Some(100);
        let mut tokens = setting("bridge_tokens", SettingType::Int);
        tokens.minimum = Some(0);
        tokens.maximum = Some(100);

        SettingsCatalog::new(SettingsSchema {
            schema_version: "0.1".to_string(),
            generator_version: None,
            settings: vec![hunt, goal, bridge, tokens, logic, tricks],
            starting_pools: IndexMap::new(),
        })
        .expect("catalog")
    }

    fn resolved(entries: Vec<(&str, SettingValue)>) -> ResolvedSettings {
        entries
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    #[test]
    fn disabled_settings_are_removed() {
        let catalog = catalog();
        let mut settings = resolved(vec![
            ("triforce_hunt", SettingValue::Bool(false)),
            ("triforce_goal_per_world", SettingValue::Int(20)),
            ("bridge", SettingValue::from("open")),
            ("bridge_tokens", SettingValue::Int(30)),
            ("logic_rules", SettingValue::from("no_logic")),
            ("allowed_tricks", SettingValue::List(vec!["a".into()])),
        ]);
        let removed = prune(&mut settings, &catalog);
        assert_eq!(
            removed,
            vec!["triforce_goal_per_world", "bridge_tokens", "allowed_tricks"]
        );
        assert_eq!(settings.len(), 3);
    }

    #[test]
    fn negated_rule_keeps_matching_value() {
        let catalog = catalog();
        let mut settings = resolved(vec![
            ("bridge", SettingValue::from("tokens")),
            ("bridge_tokens", SettingValue::Int(30)),
        ]);
        assert!(prune(&mut settings, &catalog).is_empty());
        assert!(settings.contains_key("bridge_tokens"));
    }

    #[test]
    fn pruning_is_idempotent() {
        let catalog = catalog();
        let mut settings = resolved(vec![
            ("triforce_hunt", SettingValue::Bool(false)),
            ("triforce_goal_per_world", SettingValue::Int(20)),
            ("logic_rules", SettingValue::from("no_logic")),
        ]);
        prune(&mut settings, &catalog);
        let once = settings.clone();
        assert!(prune(&mut settings, &catalog).is_empty());
        assert_eq!(settings, once);
    }
}

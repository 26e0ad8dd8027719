use plando_core::{ResolvedSettings, SchemaProvider, SettingType, SettingValue};

use crate::errors::{Result, RollError};

/// Turn raw string draws into the types the schema declares.
pub fn coerce_settings(settings: &mut ResolvedSettings, schema: &dyn SchemaProvider) -> Result<()> {
    for (name, value) in settings.iter_mut() {
        let setting = schema.require(name)?;
        let coerced = match (setting.setting_type, &*value) {
            (SettingType::List, SettingValue::List(_)) => continue,
            (SettingType::List, other) => {
                return Err(RollError::Coercion {
                    setting: name.clone(),
                    value: other.to_string(),
                });
            }
            (_, SettingValue::List(items)) => {
                return Err(RollError::Coercion {
                    setting: name.clone(),
                    value: format!("{items:?}"),
                });
            }
            (_, scalar) => {
                let raw = scalar.option_key().unwrap_or_default();
                setting.coerce(&raw).map_err(|_| RollError::Coercion {
                    setting: name.clone(),
                    value: raw,
                })?
            }
        };
        *value = coerced;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use plando_core::{SettingInfo, SettingsCatalog, SettingsSchema};

    fn setting(name: &str, setting_type: SettingType, choices: &[&str]) -> SettingInfo {
        SettingInfo {
            name: name.to_string(),
            setting_type,
            choices: choices.iter().map(|choice| choice.to_string()).collect(),
            minimum: Some(0),
            maximum: Some(100),
            section: None,
            tab: None,
            randomizable: true,
            disable: IndexMap::new(),
        }
    }

    fn catalog() -> SettingsCatalog {
        let mut bridge = setting("bridge", SettingType::Str, &["open", "tokens"]);
        bridge.minimum = None;
        bridge.maximum = None;
        SettingsCatalog::new(SettingsSchema {
            schema_version: "0.1".to_string(),
            generator_version: None,
            settings: vec![
                setting("triforce_hunt", SettingType::Bool, &[]),
                setting("bridge_tokens", SettingType::Int, &[]),
                bridge,
                setting("allowed_tricks", SettingType::List, &[]),
            ],
            starting_pools: IndexMap::new(),
        })
        .expect("catalog")
    }

    #[test]
    fn strings_become_typed_values() {
        let mut settings = ResolvedSettings::new();
        settings.insert("triforce_hunt".into(), SettingValue::from("true"));
        settings.insert("bridge_tokens".into(), SettingValue::from("42"));
        settings.insert("bridge".into(), SettingValue::from("tokens"));
        settings.insert("allowed_tricks".into(), SettingValue::List(vec!["x".into()]));
        coerce_settings(&mut settings, &catalog()).expect("coerce");
        assert_eq!(settings["triforce_hunt"], SettingValue::Bool(true));
        assert_eq!(settings["bridge_tokens"], SettingValue::Int(42));
        assert_eq!(settings["bridge"], SettingValue::from("tokens"));

        // Already typed values pass through unchanged.
        coerce_settings(&mut settings, &catalog()).expect("coerce twice");
        assert_eq!(settings["bridge_tokens"], SettingValue::Int(42));
    }

    #[test]
    fn bad_values_are_retryable_errors() {
        let mut settings = ResolvedSettings::new();
        settings.insert("triforce_hunt".into(), SettingValue::from("sometimes"));
        let err = coerce_settings(&mut settings, &catalog()).expect_err("bad bool");
        assert!(err.is_retryable());

        let mut settings = ResolvedSettings::new();
        settings.insert("bridge_tokens".into(), SettingValue::from("500"));
        assert!(coerce_settings(&mut settings, &catalog()).is_err());
    }
}

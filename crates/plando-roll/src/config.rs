use indexmap::IndexMap;
use plando_core::{SchemaProvider, SettingType};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, RollError};

/// Immutable knobs of the resolution engine, validated once per schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Settings never drawn, left to the generator's defaults.
    pub excluded_settings: Vec<String>,
    /// Integer settings whose weights are synthesized from `<name>_min/_max`.
    pub range_settings: Vec<String>,
    pub range_default_min: i64,
    pub range_default_max: i64,
    /// Option key copied verbatim into a list setting.
    pub literal_options: IndexMap<String, String>,
    /// Literal targets written as `[]` when their option is missing.
    pub empty_when_missing: Vec<String>,
    /// Settings dropped when their `<name>_random` companion is true.
    pub random_companions: Vec<String>,
    pub user_message: Option<String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            excluded_settings: Vec::new(),
            range_settings: [
                "bridge_tokens",
                "ganon_bosskey_tokens",
                "bridge_hearts",
                "ganon_bosskey_hearts",
                "triforce_goal_per_world",
                "triforce_count_per_world",
            ]
            .iter()
            .map(|name| name.to_string())
            .collect(),
            range_default_min: 1,
            range_default_max: 100,
            literal_options: [
                ("tricks", "allowed_tricks"),
                ("disabled_locations", "disabled_locations"),
                ("misc_hints", "misc_hints"),
            ]
            .iter()
            .map(|(option, setting)| (option.to_string(), setting.to_string()))
            .collect(),
            empty_when_missing: vec!["misc_hints".to_string()],
            random_companions: ["trials", "chicken_count", "big_poe_count"]
                .iter()
                .map(|name| name.to_string())
                .collect(),
            user_message: Some(default_user_message()),
        }
    }
}

pub fn default_user_message() -> String {
    format!("Plando Resolver v{}", env!("CARGO_PKG_VERSION"))
}

impl ResolveConfig {
    /// Check every named setting against the schema.
    ///
    /// Range settings missing from the schema are dropped rather than
    /// rejected so one config serves several generator versions.
    pub fn validate(&self, schema: &dyn SchemaProvider) -> Result<ResolveConfig> {
        if self.range_default_min > self.range_default_max {
            return Err(RollError::InvalidConfig(format!(
                "range_default_min {} is greater than range_default_max {}",
                self.range_default_min, self.range_default_max
            )));
        }

        for name in &self.excluded_settings {
            if schema.setting(name).is_none() {
                return Err(RollError::InvalidConfig(format!(
                    "excluded setting '{name}' is not in the schema"
                )));
            }
        }

        let mut config = self.clone();
        config.range_settings.retain(|name| schema.setting(name).is_some());
        for name in &config.range_settings {
            let setting = schema.require(name)?;
            if setting.setting_type != SettingType::Int {
                return Err(RollError::InvalidConfig(format!(
                    "range setting '{name}' is not an integer setting"
                )));
            }
        }

        for target in self
            .literal_options
            .values()
            .chain(self.empty_when_missing.iter())
        {
            match schema.setting(target) {
                Some(setting) if setting.setting_type == SettingType::List => {}
                Some(_) => {
                    return Err(RollError::InvalidConfig(format!(
                        "literal target '{target}' is not a list setting"
                    )));
                }
                None => {
                    return Err(RollError::InvalidConfig(format!(
                        "literal target '{target}' is not in the schema"
                    )));
                }
            }
        }

        for name in &self.random_companions {
            let companion = format!("{name}_random");
            if schema.setting(name).is_none() || schema.setting(&companion).is_none() {
                return Err(RollError::InvalidConfig(format!(
                    "random companion '{name}' needs both '{name}' and '{companion}' in the schema"
                )));
            }
        }

        Ok(config)
    }

    /// Bounds for a range setting, clamped to the schema limits when the
    /// weights do not name them.
    pub fn range_bounds(
        &self,
        setting: &str,
        options_min: Option<i64>,
        options_max: Option<i64>,
        schema: &dyn SchemaProvider,
    ) -> (i64, i64) {
        let info = schema.setting(setting);
        let min = options_min.unwrap_or_else(|| {
            let schema_min = info.and_then(|info| info.minimum);
            schema_min.map_or(self.range_default_min, |floor| {
                self.range_default_min.max(floor)
            })
        });
        let max = options_max.unwrap_or_else(|| {
            let schema_max = info.and_then(|info| info.maximum);
            schema_max.map_or(self.range_default_max, |ceiling| {
                self.range_default_max.min(ceiling)
            })
        });
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plando_core::SettingsCatalog;
    use std::path::Path;

    fn catalog() -> SettingsCatalog {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/settings_schema.json");
        SettingsCatalog::from_path(&path).expect("fixture schema")
    }

    #[test]
    fn defaults_validate_against_fixture_schema() {
        let config = ResolveConfig::default().validate(&catalog()).expect("valid");
        assert_eq!(config.range_settings.len(), 6);
        assert!(config.user_message.is_some());
    }

    #[test]
    fn default_bounds_respect_schema_limits() {
        let config = ResolveConfig::default();
        let catalog = catalog();
        assert_eq!(config.range_bounds("bridge_hearts", None, None, &catalog), (4, 20));
        assert_eq!(config.range_bounds("bridge_tokens", None, None, &catalog), (1, 100));
        assert_eq!(
            config.range_bounds("bridge_tokens", Some(20), Some(50), &catalog),
            (20, 50)
        );
    }

    #[test]
    fn unknown_names_are_configuration_errors() {
        let catalog = catalog();
        let mut config = ResolveConfig::default();
        config.excluded_settings.push("shuffle_beans".to_string());
        assert!(matches!(
            config.validate(&catalog),
            Err(RollError::InvalidConfig(_))
        ));

        let mut config = ResolveConfig::default();
        config
            .literal_options
            .insert("tricks".to_string(), "bridge".to_string());
        assert!(config.validate(&catalog).is_err());

        let mut config = ResolveConfig::default();
        config.range_settings.push("bridge".to_string());
        assert!(config.validate(&catalog).is_err());

        let mut config = ResolveConfig::default();
        config.range_settings.push("mirror_world".to_string());
        let validated = config.validate(&catalog).expect("dropped silently");
        assert!(!validated.range_settings.contains(&"mirror_world".to_string()));
    }
}

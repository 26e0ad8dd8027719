use std::path::{Path, PathBuf};

use plando_roll::{GeneratorConfig, ResolveConfig};
use serde::{Deserialize, Serialize};

use super::WorkspaceResult;
use super::atomic::write_bytes_atomic;

pub const DEFAULT_SETTINGS_FILE: &str = "plando.toml";

/// File locations, relative to the working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub schema: PathBuf,
    pub weights: String,
    pub data_dir: PathBuf,
    /// Rejected plandos are moved here; deleted when unset.
    pub failed_dir: Option<PathBuf>,
    pub runs_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            schema: PathBuf::from("settings_schema.json"),
            weights: "weights/rsl_season.json".to_string(),
            data_dir: PathBuf::from("data"),
            failed_dir: None,
            runs_dir: PathBuf::from("runs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryDefaults {
    /// Plando draws before giving up.
    pub plando_retries: u32,
    /// Generator runs per drawn plando.
    pub rando_retries: u32,
}

impl Default for RetryDefaults {
    fn default() -> Self {
        Self {
            plando_retries: 5,
            rando_retries: 3,
        }
    }
}

/// Contents of `plando.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlandoSettings {
    pub paths: PathSettings,
    pub retries: RetryDefaults,
    pub generator: GeneratorConfig,
    pub resolve: ResolveConfig,
}

pub fn load_or_create_settings(path: &Path) -> WorkspaceResult<PlandoSettings> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let settings: PlandoSettings = toml::from_str(&content)?;
        return Ok(settings);
    }

    let settings = PlandoSettings::default();
    save_settings(path, &settings)?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &PlandoSettings) -> WorkspaceResult<()> {
    let encoded = toml::to_string_pretty(settings)?;
    write_bytes_atomic(path, encoded.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_settings_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("plando_settings_{}", uuid::Uuid::new_v4()))
            .join(DEFAULT_SETTINGS_FILE)
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let path = temp_settings_path();
        let created = load_or_create_settings(&path).expect("create");
        assert!(path.exists());
        assert_eq!(created, PlandoSettings::default());

        let reloaded = load_or_create_settings(&path).expect("reload");
        assert_eq!(reloaded, created);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let path = temp_settings_path();
        std::fs::create_dir_all(path.parent().expect("parent")).expect("dir");
        std::fs::write(
            &path,
            r#"
[retries]
plando_retries = 9

[generator]
program = "/usr/bin/python3"

[resolve]
excluded_settings = ["starting_age"]
"#,
        )
        .expect("write");

        let settings = load_or_create_settings(&path).expect("load");
        assert_eq!(settings.retries.plando_retries, 9);
        assert_eq!(settings.retries.rando_retries, 3);
        assert_eq!(settings.generator.program, PathBuf::from("/usr/bin/python3"));
        assert_eq!(settings.generator.compress_rom, "Patch");
        assert_eq!(settings.resolve.excluded_settings, vec!["starting_age"]);
        assert!(!settings.resolve.range_settings.is_empty());
        assert_eq!(settings.paths.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn unknown_types_are_rejected() {
        let path = temp_settings_path();
        std::fs::create_dir_all(path.parent().expect("parent")).expect("dir");
        std::fs::write(&path, "[retries]\nplando_retries = \"many\"\n").expect("write");
        assert!(load_or_create_settings(&path).is_err());
    }
}

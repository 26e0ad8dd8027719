use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use plando_core::SettingValue;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{BenchError, Result};
use crate::expected::{SettingExpectation, SettingKind};

/// Observed option counts over a set of seeds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    /// Files that carried a `settings` object.
    pub files: u64,
    /// Files skipped because they were not plandos or spoiler logs.
    pub skipped: Vec<PathBuf>,
    pub counts: HashMap<String, IndexMap<String, u64>>,
    /// Seeds where the setting was absent, usually pruned by another setting.
    pub disabled: HashMap<String, u64>,
}

impl Tally {
    pub fn count(&self, setting: &str, option: &str) -> u64 {
        self.counts
            .get(setting)
            .and_then(|options| options.get(option))
            .copied()
            .unwrap_or(0)
    }

    pub fn disabled_seeds(&self, setting: &str) -> u64 {
        self.disabled.get(setting).copied().unwrap_or(0)
    }

    /// Seeds in which the setting was present.
    pub fn enabled_seeds(&self, setting: &str) -> u64 {
        self.files.saturating_sub(self.disabled_seeds(setting))
    }

    /// Count one seed's settings.
    pub fn observe(
        &mut self,
        settings: &serde_json::Map<String, Value>,
        expected: &IndexMap<String, SettingExpectation>,
    ) {
        self.files += 1;
        for (setting, expectation) in expected {
            let Some(value) = settings.get(setting).and_then(SettingValue::from_json) else {
                *self.disabled.entry(setting.clone()).or_default() += 1;
                continue;
            };
            let counts = self.counts.entry(setting.clone()).or_default();
            match (&value, expectation.kind) {
                (SettingValue::List(items), SettingKind::Geometric) => {
                    *counts.entry(items.len().to_string()).or_default() += 1;
                }
                (SettingValue::List(items), _) => {
                    for item in items {
                        *counts.entry(item.clone()).or_default() += 1;
                    }
                }
                (scalar, _) => {
                    if let Some(option) = scalar.option_key() {
                        *counts.entry(option).or_default() += 1;
                    }
                }
            }
        }
    }
}

/// Tally every JSON file in `dir` carrying a top-level `settings` object.
///
/// Both plando files and generator spoiler logs have that shape.
pub fn tally_dir(dir: &Path, expected: &IndexMap<String, SettingExpectation>) -> Result<Tally> {
    if !dir.is_dir() {
        return Err(BenchError::MissingDataset(dir.display().to_string()));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut tally = Tally::default();
    for path in paths {
        let contents = std::fs::read_to_string(&path)?;
        let settings = match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(mut document)) => match document.remove("settings") {
                Some(Value::Object(settings)) => settings,
                _ => {
                    debug!(path = %path.display(), "no settings object");
                    tally.skipped.push(path);
                    continue;
                }
            },
            Ok(_) | Err(_) => {
                warn!(path = %path.display(), "skipping unreadable seed file");
                tally.skipped.push(path);
                continue;
            }
        };
        tally.observe(&settings, expected);
    }
    Ok(tally)
}

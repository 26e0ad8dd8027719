use std::path::{Path, PathBuf};

use plando_core::ResolvedSettings;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Plando file handed to the external generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlandoDocument {
    pub settings: ResolvedSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PlandoMeta>,
}

/// Run metadata carried next to the settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlandoMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pruned: Vec<String>,
}

impl PlandoDocument {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Writes plando files into the data directory.
#[derive(Debug, Clone)]
pub struct PlandoWriter {
    data_dir: PathBuf,
}

impl PlandoWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `random_settings_<utc timestamp>_<short id>.json`
    pub fn next_file_name() -> String {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S_%6f");
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("random_settings_{timestamp}_{}.json", &id[..8])
    }

    pub fn write(&self, document: &PlandoDocument) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.data_dir.join(Self::next_file_name());
        std::fs::write(&path, serde_json::to_vec_pretty(document)?)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plando_core::SettingValue;

    #[test]
    fn file_names_are_unique_and_prefixed() {
        let first = PlandoWriter::next_file_name();
        let second = PlandoWriter::next_file_name();
        assert!(first.starts_with("random_settings_"));
        assert!(first.ends_with(".json"));
        assert_ne!(first, second);
    }

    #[test]
    fn written_document_reads_back_typed() {
        let dir = std::env::temp_dir().join(format!("plando_output_{}", uuid::Uuid::new_v4()));
        let writer = PlandoWriter::new(&dir);
        let mut settings = ResolvedSettings::new();
        settings.insert("triforce_hunt".into(), SettingValue::Bool(false));
        settings.insert("bridge_tokens".into(), SettingValue::Int(35));
        settings.insert("bridge".into(), SettingValue::from("tokens"));
        settings.insert("misc_hints".into(), SettingValue::List(vec!["altar".into()]));
        let document = PlandoDocument {
            settings,
            meta: Some(PlandoMeta {
                version: Some("0.1.0".to_string()),
                seed: Some(7),
                attempt: 1,
                weights_fingerprint: None,
                pruned: Vec::new(),
            }),
        };

        let path = writer.write(&document).expect("write");
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
        assert_eq!(raw["settings"]["triforce_hunt"], serde_json::json!(false));
        assert_eq!(raw["settings"]["bridge_tokens"], serde_json::json!(35));
        assert_eq!(PlandoDocument::from_path(&path).expect("parse"), document);
    }
}

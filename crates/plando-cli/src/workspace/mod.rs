mod atomic;
mod settings;

pub use atomic::write_json_atomic;
pub use settings::{DEFAULT_SETTINGS_FILE, PlandoSettings, load_or_create_settings};

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("toml encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

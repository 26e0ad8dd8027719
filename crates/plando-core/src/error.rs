use thiserror::Error;

/// Core error type shared across plando crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The settings schema violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A setting name is not known to the schema provider.
    #[error("unknown setting: {0}")]
    UnknownSetting(String),
    /// A raw value cannot be represented with the declared setting type.
    #[error("cannot coerce {value} for setting {setting}")]
    Coercion { setting: String, value: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results returned by plando crates.
pub type Result<T> = std::result::Result<T, Error>;

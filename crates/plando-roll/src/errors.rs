use thiserror::Error;

/// Errors emitted while resolving and validating plandos.
#[derive(Debug, Error)]
pub enum RollError {
    #[error("setting '{0}' has not been resolved yet")]
    MissingSetting(String),
    #[error("no option of '{0}' has a positive weight")]
    EmptyWeights(String),
    #[error("draw failed for '{setting}': {message}")]
    Draw { setting: String, message: String },
    #[error("cannot coerce {value:?} for setting '{setting}'")]
    Coercion { setting: String, value: String },
    #[error("unknown conditional rule '{0}'")]
    UnknownRule(String),
    #[error("{rule}: {message}")]
    InvalidParams { rule: String, message: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("generator rejected plando: {0}")]
    Rejected(String),
    #[error("gave up after {attempts} attempts: {diagnostic}")]
    RetriesExhausted { attempts: u32, diagnostic: String },
    #[error("schema error: {0}")]
    Schema(#[from] plando_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RollError {
    /// Attempt-scoped failures consume retry budget; everything else is fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RollError::MissingSetting(_)
                | RollError::EmptyWeights(_)
                | RollError::Draw { .. }
                | RollError::Coercion { .. }
                | RollError::Rejected(_)
        )
    }

    pub(crate) fn invalid_params(rule: &str, message: impl Into<String>) -> Self {
        RollError::InvalidParams {
            rule: rule.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RollError>;

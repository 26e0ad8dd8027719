use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::{Resolution, ResolutionEngine};
use crate::errors::{Result, RollError};
use crate::output::{PlandoDocument, PlandoMeta, PlandoWriter};

/// Verdict of one validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted { summary: String },
    Rejected { diagnostic: String },
}

/// Anything that can accept or reject a written plando file.
pub trait PlandoValidator {
    fn validate(&mut self, plando: &Path) -> Result<ValidationOutcome>;
}

/// Retry budget for the draw/validate loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Plando draws before giving up.
    pub max_attempts: u32,
    /// Validation runs per drawn plando.
    pub runs_per_plando: u32,
    /// Where rejected plandos are moved; deleted when unset.
    pub failed_dir: Option<PathBuf>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            runs_per_plando: 1,
            failed_dir: None,
        }
    }
}

/// Successful end of a generation loop.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub plando: PathBuf,
    pub attempts: u32,
    pub resolution: Resolution,
    /// Validator summary; `None` when validation was skipped.
    pub summary: Option<String>,
}

/// DRAW -> VALIDATE -> {ACCEPT, RETRY}.
pub struct GenerationLoop<'e, 's> {
    engine: &'e ResolutionEngine<'s>,
    writer: PlandoWriter,
    policy: RetryPolicy,
    seed: Option<u64>,
    fingerprint: Option<String>,
}

impl<'e, 's> GenerationLoop<'e, 's> {
    pub fn new(engine: &'e ResolutionEngine<'s>, writer: PlandoWriter, policy: RetryPolicy) -> Self {
        Self {
            engine,
            writer,
            policy,
            seed: None,
            fingerprint: None,
        }
    }

    /// Metadata recorded in every written plando.
    pub fn with_metadata(mut self, seed: Option<u64>, fingerprint: Option<String>) -> Self {
        self.seed = seed;
        self.fingerprint = fingerprint;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Draw until a plando validates or the budget runs out.
    pub fn run(
        &self,
        validator: &mut dyn PlandoValidator,
        rng: &mut dyn RngCore,
    ) -> Result<GenerationOutcome> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut diagnostic = String::new();

        for attempt in 1..=max_attempts {
            let (plando, resolution) = match self.draw(attempt, rng) {
                Ok(drawn) => drawn,
                Err(err) if err.is_retryable() => {
                    warn!(attempt, error = %err, "draw failed");
                    diagnostic = err.to_string();
                    continue;
                }
                Err(err) => return Err(err),
            };

            match self.validate(&plando, validator)? {
                ValidationOutcome::Accepted { summary } => {
                    info!(attempt, plando = %plando.display(), "plando accepted");
                    return Ok(GenerationOutcome {
                        plando,
                        attempts: attempt,
                        resolution,
                        summary: Some(summary),
                    });
                }
                ValidationOutcome::Rejected {
                    diagnostic: rejected,
                } => {
                    warn!(attempt, max_attempts, plando = %plando.display(), "plando rejected");
                    self.discard(&plando)?;
                    diagnostic = rejected;
                }
            }
        }

        Err(RollError::RetriesExhausted {
            attempts: max_attempts,
            diagnostic,
        })
    }

    /// Draw and write a plando without validating it.
    ///
    /// Draw failures still consume the attempt budget.
    pub fn run_without_validation(&self, rng: &mut dyn RngCore) -> Result<GenerationOutcome> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut diagnostic = String::new();
        for attempt in 1..=max_attempts {
            match self.draw(attempt, rng) {
                Ok((plando, resolution)) => {
                    info!(attempt, plando = %plando.display(), "plando written");
                    return Ok(GenerationOutcome {
                        plando,
                        attempts: attempt,
                        resolution,
                        summary: None,
                    });
                }
                Err(err) if err.is_retryable() => {
                    warn!(attempt, error = %err, "draw failed");
                    diagnostic = err.to_string();
                }
                Err(err) => return Err(err),
            }
        }
        Err(RollError::RetriesExhausted {
            attempts: max_attempts,
            diagnostic,
        })
    }

    fn draw(&self, attempt: u32, rng: &mut dyn RngCore) -> Result<(PathBuf, Resolution)> {
        let resolution = self.engine.resolve(rng)?;
        let document = PlandoDocument {
            settings: resolution.settings.clone(),
            meta: Some(PlandoMeta {
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
                seed: self.seed,
                attempt,
                weights_fingerprint: self.fingerprint.clone(),
                pruned: resolution.pruned.clone(),
            }),
        };
        let plando = self.writer.write(&document)?;
        Ok((plando, resolution))
    }

    fn validate(
        &self,
        plando: &Path,
        validator: &mut dyn PlandoValidator,
    ) -> Result<ValidationOutcome> {
        let runs = self.policy.runs_per_plando.max(1);
        let mut last = ValidationOutcome::Rejected {
            diagnostic: String::new(),
        };
        for run in 1..=runs {
            info!(run, runs, plando = %plando.display(), "validating plando");
            last = validator.validate(plando)?;
            if matches!(last, ValidationOutcome::Accepted { .. }) {
                break;
            }
        }
        Ok(last)
    }

    fn discard(&self, plando: &Path) -> Result<()> {
        if !plando.exists() {
            return Ok(());
        }
        match &self.policy.failed_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                if let Some(name) = plando.file_name() {
                    std::fs::rename(plando, dir.join(name))?;
                }
            }
            None => std::fs::remove_file(plando)?,
        }
        Ok(())
    }
}

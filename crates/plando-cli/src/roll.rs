use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use plando_roll::{
    ExternalGenerator, GenerationLoop, GenerationOutcome, PlandoWriter, ResolutionEngine,
    RetryPolicy, RollError,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::registry::{
    RunContext, RunPaths, RunStatus, RunSummary, init_run_logging, start_run, write_error_log,
    write_summary,
};
use crate::{CliError, Inputs, WeightsArgs, load_inputs};

#[derive(Args, Debug)]
pub(crate) struct RollArgs {
    #[command(flatten)]
    pub(crate) inputs: WeightsArgs,
    #[arg(long, default_value_t = 1)]
    pub(crate) world_count: u32,
    /// Write plandos without running the generator.
    #[arg(long, default_value_t = false)]
    pub(crate) no_seed: bool,
    /// Plando draws before giving up.
    #[arg(long)]
    pub(crate) plando_retries: Option<u32>,
    /// Generator runs per drawn plando.
    #[arg(long)]
    pub(crate) rando_retries: Option<u32>,
    /// Number of plandos to roll in sequence.
    #[arg(long, default_value_t = 1)]
    pub(crate) seed_count: u32,
    /// RNG seed; drawn from OS entropy when omitted.
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    #[arg(long)]
    pub(crate) run_dir: Option<PathBuf>,
    /// Skip writing ERRORLOG.TXT on failure.
    #[arg(long, default_value_t = false)]
    pub(crate) no_log_errors: bool,
    /// Delete the plandos written by this run once it ends.
    #[arg(long, default_value_t = false)]
    pub(crate) cleanup: bool,
}

/// Effective roll options recorded in the run config.
#[derive(Debug, Clone, Serialize)]
struct RollOptions {
    world_count: u32,
    no_seed: bool,
    seed_count: u32,
    data_dir: PathBuf,
    retry: RetryPolicy,
    cleanup: bool,
}

pub(crate) fn run_roll(args: RollArgs) -> Result<(), CliError> {
    if args.seed_count == 0 {
        return Err(CliError::InvalidConfig(
            "--seed-count must be at least 1".to_string(),
        ));
    }
    if args.world_count == 0 {
        return Err(CliError::InvalidConfig(
            "--world-count must be at least 1".to_string(),
        ));
    }

    let inputs = load_inputs(&args.inputs)?;
    let settings = &inputs.settings;
    let seed = args.seed.unwrap_or_else(rand::random);

    let options = RollOptions {
        world_count: args.world_count,
        no_seed: args.no_seed,
        seed_count: args.seed_count,
        data_dir: settings.paths.data_dir.clone(),
        retry: RetryPolicy {
            max_attempts: args
                .plando_retries
                .unwrap_or(settings.retries.plando_retries),
            runs_per_plando: args
                .rando_retries
                .unwrap_or(settings.retries.rando_retries),
            failed_dir: settings.paths.failed_dir.clone(),
        },
        cleanup: args.cleanup,
    };

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        command: "roll".to_string(),
        run_dir: args
            .run_dir
            .clone()
            .unwrap_or_else(|| settings.paths.runs_dir.clone()),
        seed: Some(seed),
        weights_sources: inputs.weights.sources.clone(),
        weights_fingerprint: Some(inputs.weights.fingerprint.clone()),
        options: serde_json::to_value(&options)?,
    };
    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    info!(
        event = "run_started",
        run_id = %run_id,
        seed,
        weights = %inputs.weights.sources.join(" + "),
        fingerprint = %inputs.weights.fingerprint
    );
    for warning in &inputs.weights.warnings {
        warn!(event = "weights_warning", warning = %warning);
    }

    let timer = Instant::now();
    let mut outcomes = Vec::new();
    let result = roll_batch(&inputs, &options, seed, &mut outcomes);

    let artifacts: Vec<PathBuf> = outcomes.iter().map(|outcome| outcome.plando.clone()).collect();
    if options.cleanup {
        remove_artifacts(&artifacts);
    }

    let (status, error) = match &result {
        Ok(()) => (RunStatus::Ok, None),
        Err(err) => {
            let status = match err {
                CliError::Roll(RollError::RetriesExhausted { .. }) => RunStatus::RetriesExhausted,
                _ => RunStatus::Error,
            };
            (status, Some(err.to_string()))
        }
    };
    if let Some(message) = &error {
        record_failure(&run_paths, message, args.no_log_errors);
    }

    write_summary(
        &run_paths,
        &RunSummary {
            run_id,
            status,
            finished_at: chrono::Utc::now().to_rfc3339(),
            duration_ms: timer.elapsed().as_millis(),
            artifacts: if options.cleanup {
                Vec::new()
            } else {
                artifacts.clone()
            },
            attempts: outcomes.iter().map(|outcome| outcome.attempts).collect(),
            error,
        },
    )?;

    result?;

    info!(
        event = "run_finished",
        status = "success",
        plandos = outcomes.len(),
        duration_ms = timer.elapsed().as_millis()
    );
    if !options.cleanup {
        for artifact in &artifacts {
            println!("{}", artifact.display());
        }
    }
    Ok(())
}

/// Roll `seed_count` plandos sequentially from one RNG stream.
///
/// Outcomes are pushed as they complete so a failing batch still reports
/// the plandos written before it.
fn roll_batch(
    inputs: &Inputs,
    options: &RollOptions,
    seed: u64,
    outcomes: &mut Vec<GenerationOutcome>,
) -> Result<(), CliError> {
    let engine = ResolutionEngine::new(
        &inputs.catalog,
        inputs.weights.table.clone(),
        inputs.settings.resolve.clone(),
    )?;
    let generation = GenerationLoop::new(
        &engine,
        PlandoWriter::new(&options.data_dir),
        options.retry.clone(),
    )
    .with_metadata(Some(seed), Some(inputs.weights.fingerprint.clone()));
    let mut generator =
        ExternalGenerator::new(inputs.settings.generator.clone(), options.world_count);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    for index in 1..=options.seed_count {
        let outcome = if options.no_seed {
            generation.run_without_validation(&mut rng)?
        } else {
            generation.run(&mut generator, &mut rng)?
        };
        info!(
            event = "plando_ready",
            index,
            attempts = outcome.attempts,
            plando = %outcome.plando.display()
        );
        if let Some(summary) = &outcome.summary {
            info!(event = "generator_summary", summary = %summary);
        }
        outcomes.push(outcome);
    }
    Ok(())
}

fn record_failure(paths: &RunPaths, message: &str, no_log_errors: bool) {
    warn!(event = "run_failed", error = %message);
    if no_log_errors {
        return;
    }
    if let Err(err) = write_error_log(paths, message) {
        warn!(event = "error_log_failed", error = %err);
    }
}

fn remove_artifacts(artifacts: &[PathBuf]) {
    for path in artifacts {
        if !path.exists() {
            continue;
        }
        match std::fs::remove_file(path) {
            Ok(()) => info!(event = "plando_removed", plando = %path.display()),
            Err(err) => warn!(event = "cleanup_failed", plando = %path.display(), error = %err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use plando_core::SettingsCatalog;
    use plando_weights::{WeightsSource, load_weights};

    use crate::workspace::PlandoSettings;

    fn fixtures_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures")
    }

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("plando_cli_{label}_{}", Uuid::new_v4()))
    }

    fn inputs(overrides: &[WeightsSource]) -> Inputs {
        let catalog = SettingsCatalog::from_path(&fixtures_dir().join("settings_schema.json"))
            .expect("schema");
        let base = WeightsSource::Path(fixtures_dir().join("weights/base.json"));
        let weights = load_weights(&base, overrides, &catalog).expect("weights");
        Inputs {
            settings: PlandoSettings::default(),
            catalog,
            weights,
        }
    }

    fn options(data_dir: PathBuf, seed_count: u32) -> RollOptions {
        RollOptions {
            world_count: 1,
            no_seed: true,
            seed_count,
            data_dir,
            retry: RetryPolicy::default(),
            cleanup: false,
        }
    }

    #[test]
    fn batch_writes_one_plando_per_seed() {
        let data_dir = temp_dir("batch");
        let mut outcomes = Vec::new();
        roll_batch(&inputs(&[]), &options(data_dir.clone(), 3), 11, &mut outcomes)
            .expect("batch");

        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes {
            assert!(outcome.plando.starts_with(&data_dir));
            assert!(outcome.plando.exists());
            assert_eq!(outcome.summary, None);
        }

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&outcomes[0].plando).expect("read"))
                .expect("json");
        assert_eq!(raw["meta"]["seed"], 11);
        assert!(raw["settings"]["user_message"].is_string());
    }

    #[test]
    fn same_seed_rolls_same_settings() {
        let first = {
            let mut outcomes = Vec::new();
            roll_batch(&inputs(&[]), &options(temp_dir("a"), 2), 99, &mut outcomes)
                .expect("batch");
            outcomes
        };
        let second = {
            let mut outcomes = Vec::new();
            roll_batch(&inputs(&[]), &options(temp_dir("b"), 2), 99, &mut outcomes)
                .expect("batch");
            outcomes
        };
        for (left, right) in first.iter().zip(&second) {
            assert_eq!(left.resolution.settings, right.resolution.settings);
        }
    }

    #[test]
    fn cleanup_removes_written_plandos() {
        let data_dir = temp_dir("cleanup");
        let mut outcomes = Vec::new();
        roll_batch(&inputs(&[]), &options(data_dir.clone(), 2), 5, &mut outcomes)
            .expect("batch");
        let artifacts: Vec<PathBuf> = outcomes.iter().map(|outcome| outcome.plando.clone()).collect();

        remove_artifacts(&artifacts);

        assert!(artifacts.iter().all(|path| !path.exists()));
    }

    #[test]
    fn error_log_is_skipped_when_disabled() {
        let run_dir = temp_dir("runs");
        let paths = start_run(&RunContext {
            run_id: Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now(),
            command: "roll".to_string(),
            run_dir,
            seed: None,
            weights_sources: Vec::new(),
            weights_fingerprint: None,
            options: serde_json::Value::Null,
        })
        .expect("run");

        record_failure(&paths, "gave up after 5 attempts", true);
        assert!(!paths.error_log_path.exists());
        record_failure(&paths, "gave up after 5 attempts", false);
        assert!(paths.error_log_path.exists());
    }
}

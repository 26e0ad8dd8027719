mod registry;
mod roll;
mod workspace;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use plando_bench::{BenchError, BenchmarkEngine, BenchmarkOptions, OptionFlag};
use plando_core::{Error as CoreError, SettingsCatalog};
use plando_roll::{ResolutionEngine, RollError};
use plando_weights::{
    LoadedWeights, WeightsDocument, WeightsError, WeightsSource, apply_overrides,
    balanced_weights, check_setting_drift, load_weights, weights_json_schema,
};
use registry::{
    RunContext, RunStatus, RunSummary, init_run_logging, init_stderr_logging, start_run,
    write_summary,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use workspace::{DEFAULT_SETTINGS_FILE, PlandoSettings, WorkspaceError, load_or_create_settings};

/// Weights preset drawing every option of every setting uniformly.
const FULL_RANDOM: &str = "full-random";

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("settings error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("schema error: {0}")]
    Core(#[from] CoreError),
    #[error("weights error: {0}")]
    Weights(#[from] WeightsError),
    #[error(transparent)]
    Roll(#[from] RollError),
    #[error("benchmark error: {0}")]
    Bench(#[from] BenchError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("weights file drifted from the schema ({0} differences)")]
    Drift(usize),
}

impl CliError {
    /// 3 when the retry budget ran out, 2 for configuration problems.
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Roll(RollError::RetriesExhausted { .. }) => 3,
            CliError::Roll(
                RollError::InvalidConfig(_)
                | RollError::UnknownRule(_)
                | RollError::InvalidParams { .. }
                | RollError::Schema(_),
            ) => 2,
            CliError::Workspace(WorkspaceError::TomlDecode(_))
            | CliError::Core(_)
            | CliError::Weights(_)
            | CliError::Bench(BenchError::InvalidInput(_) | BenchError::MissingDataset(_))
            | CliError::InvalidConfig(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "plando", version, about = "Weighted settings resolver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Draw plandos and validate them with the generator.
    Roll(roll::RollArgs),
    /// Compare a weights file against a directory of rolled seeds.
    Benchmark(BenchmarkArgs),
    /// Report differences between a weights file and the settings schema.
    CheckSettings(CheckSettingsArgs),
    /// Print the JSON Schema of weights files.
    EmitSchema(EmitSchemaArgs),
}

/// Inputs shared by every command that needs effective weights.
#[derive(Args, Debug, Clone)]
struct WeightsArgs {
    /// Weights file, `-` for stdin, or `full-random`.
    #[arg(long)]
    weights: Option<String>,
    /// Override applied on top of the weights; repeatable, `-` reads stdin.
    #[arg(long = "override", value_name = "FILE")]
    overrides: Vec<WeightsSource>,
    /// Settings schema exported from the generator.
    #[arg(long)]
    schema: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
}

#[derive(Args, Debug)]
struct BenchmarkArgs {
    #[command(flatten)]
    inputs: WeightsArgs,
    /// Directory of plandos or spoiler logs.
    #[arg(value_name = "DATASET_DIR")]
    dataset: PathBuf,
    /// Report directory; defaults to the dataset directory.
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, default_value_t = 0.1)]
    alert_ratio: f64,
    #[arg(long, default_value_t = false)]
    no_csv: bool,
    #[arg(long)]
    run_dir: Option<PathBuf>,
}

#[derive(Serialize)]
struct BenchmarkRunOptions<'a> {
    dataset: &'a Path,
    benchmark: &'a BenchmarkOptions,
}

#[derive(Args, Debug)]
struct CheckSettingsArgs {
    /// Weights file to inspect; `-` reads stdin.
    #[arg(long)]
    weights: Option<WeightsSource>,
    #[arg(long)]
    schema: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    /// Fail when any difference is found.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

#[derive(Args, Debug)]
struct EmitSchemaArgs {
    /// Output path; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Roll(args) => roll::run_roll(args),
        Command::Benchmark(args) => run_benchmark(args),
        Command::CheckSettings(args) => run_check_settings(args),
        Command::EmitSchema(args) => run_emit_schema(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

/// Settings, schema and effective weights for one invocation.
struct Inputs {
    settings: PlandoSettings,
    catalog: SettingsCatalog,
    weights: LoadedWeights,
}

fn load_inputs(args: &WeightsArgs) -> Result<Inputs, CliError> {
    let settings = load_or_create_settings(&args.config)?;
    let schema_path = args
        .schema
        .clone()
        .unwrap_or_else(|| settings.paths.schema.clone());
    let catalog = SettingsCatalog::from_path(&schema_path)?;

    let weights_name = args
        .weights
        .clone()
        .unwrap_or_else(|| settings.paths.weights.clone());
    let weights = if weights_name == FULL_RANDOM {
        let table = balanced_weights(&catalog, &settings.resolve.excluded_settings);
        let mut loaded = apply_overrides(table, &args.overrides, &catalog)?;
        loaded.sources.insert(0, FULL_RANDOM.to_string());
        loaded
    } else {
        let base: WeightsSource = weights_name.parse().map_err(|_| {
            CliError::InvalidConfig(format!("invalid weights source '{weights_name}'"))
        })?;
        load_weights(&base, &args.overrides, &catalog)?
    };

    Ok(Inputs {
        settings,
        catalog,
        weights,
    })
}

fn run_benchmark(args: BenchmarkArgs) -> Result<(), CliError> {
    let inputs = load_inputs(&args.inputs)?;
    // Range synthesis and exclusions happen at engine construction.
    let engine = ResolutionEngine::new(
        &inputs.catalog,
        inputs.weights.table.clone(),
        inputs.settings.resolve.clone(),
    )?;

    let options = BenchmarkOptions {
        alert_ratio: args.alert_ratio,
        write_csv: !args.no_csv,
        out_dir: args.out.clone(),
    };

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        command: "benchmark".to_string(),
        run_dir: args
            .run_dir
            .clone()
            .unwrap_or_else(|| inputs.settings.paths.runs_dir.clone()),
        seed: None,
        weights_sources: inputs.weights.sources.clone(),
        weights_fingerprint: Some(inputs.weights.fingerprint.clone()),
        options: serde_json::to_value(BenchmarkRunOptions {
            dataset: &args.dataset,
            benchmark: &options,
        })?,
    };
    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;
    info!(event = "run_started", run_id = %run_id, command = "benchmark");

    let timer = Instant::now();
    let outcome = BenchmarkEngine::new(options).run(engine.table(), &inputs.catalog, &args.dataset);

    let (status, artifacts, error) = match &outcome {
        Ok(result) => {
            let mut artifacts = vec![result.report_path.clone(), result.markdown_path.clone()];
            artifacts.extend(result.csv_path.clone());
            (RunStatus::Ok, artifacts, None)
        }
        Err(err) => (RunStatus::Error, Vec::new(), Some(err.to_string())),
    };
    write_summary(
        &run_paths,
        &RunSummary {
            run_id,
            status,
            finished_at: chrono::Utc::now().to_rfc3339(),
            duration_ms: timer.elapsed().as_millis(),
            artifacts,
            attempts: Vec::new(),
            error,
        },
    )?;

    let result = outcome?;
    info!(
        event = "run_finished",
        status = "success",
        seeds = result.report.files,
        errors = result.report.flagged(OptionFlag::Error),
        alerts = result.report.flagged(OptionFlag::Alert),
        duration_ms = timer.elapsed().as_millis()
    );
    println!("{}", result.markdown_path.display());
    Ok(())
}

fn run_check_settings(args: CheckSettingsArgs) -> Result<(), CliError> {
    init_stderr_logging()?;
    let settings = load_or_create_settings(&args.config)?;
    let schema_path = args.schema.unwrap_or_else(|| settings.paths.schema.clone());
    let catalog = SettingsCatalog::from_path(&schema_path)?;

    let source = match args.weights {
        Some(source) => source,
        None => WeightsSource::Path(PathBuf::from(&settings.paths.weights)),
    };
    let document: WeightsDocument = serde_json::from_value(source.read_json()?)?;

    let resolve = &settings.resolve;
    let ignored: Vec<String> = resolve
        .range_settings
        .iter()
        .chain(resolve.literal_options.values())
        .chain(&resolve.excluded_settings)
        .cloned()
        .collect();
    let report = check_setting_drift(&document, &catalog, &ignored);

    println!("{}", serde_json::to_string_pretty(&report)?);

    let differences =
        report.removed_settings.len() + report.new_settings.len() + report.options.len();
    if !report.is_clean() {
        warn!(event = "settings_drift", weights = %source, differences);
        if args.strict {
            return Err(CliError::Drift(differences));
        }
    }
    Ok(())
}

fn run_emit_schema(args: EmitSchemaArgs) -> Result<(), CliError> {
    let schema = weights_json_schema()?;
    match args.out {
        Some(path) => {
            workspace::write_json_atomic(&path, &schema)?;
            println!("{}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&schema)?),
    }
    Ok(())
}

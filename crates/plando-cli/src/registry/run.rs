use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::workspace::write_json_atomic;

use super::RegistryResult;

pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub command: String,
    pub run_dir: PathBuf,
    pub seed: Option<u64>,
    pub weights_sources: Vec<String>,
    pub weights_fingerprint: Option<String>,
    /// Command arguments as resolved after merging `plando.toml`.
    pub options: Value,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub command: String,
    pub cli_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub weights_sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights_fingerprint: Option<String>,
    pub options: Value,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub logs_path: PathBuf,
    pub summary_path: PathBuf,
    pub error_log_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    RetriesExhausted,
    Error,
}

/// Outcome recorded in `summary.json` when a run ends.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub finished_at: String,
    pub duration_ms: u128,
    pub artifacts: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx
        .run_dir
        .join(format!("{timestamp}__{}_{}", ctx.command, ctx.run_id));

    create_dir_all(&root)?;

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        command: ctx.command.clone(),
        cli_version: CLI_VERSION.to_string(),
        seed: ctx.seed,
        weights_sources: ctx.weights_sources.clone(),
        weights_fingerprint: ctx.weights_fingerprint.clone(),
        options: ctx.options.clone(),
        git: collect_git_info(),
    };
    write_json_atomic(&root.join("config.json"), &config)?;

    let logs_path = root.join("logs.ndjson");
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&logs_path)?;

    Ok(RunPaths {
        summary_path: root.join("summary.json"),
        error_log_path: root.join("ERRORLOG.TXT"),
        logs_path,
        root,
    })
}

pub fn write_summary(paths: &RunPaths, summary: &RunSummary) -> RegistryResult<()> {
    write_json_atomic(&paths.summary_path, summary)?;
    Ok(())
}

/// Append a timestamped failure entry to the run's error log.
pub fn write_error_log(paths: &RunPaths, message: &str) -> RegistryResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.error_log_path)?;
    writeln!(file, "[{}]", Utc::now().to_rfc3339())?;
    writeln!(file, "{}", message.trim_end())?;
    writeln!(file)?;
    Ok(())
}

pub fn collect_git_info() -> GitInfo {
    let commit = git(&["rev-parse", "HEAD"])
        .map(|stdout| stdout.trim().to_string())
        .filter(|commit| !commit.is_empty());
    let dirty = git(&["status", "--porcelain"]).map(|stdout| !stdout.trim().is_empty());
    GitInfo { commit, dirty }
}

/// Stdout of a successful git invocation.
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
}

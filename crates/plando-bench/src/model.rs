use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::metrics::BenchmarkReport;

/// Options for a weights benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkOptions {
    /// Relative deviation from the expected share that raises an alert.
    pub alert_ratio: f64,
    /// Also write `benchmark.csv` with one row per option.
    pub write_csv: bool,
    /// Optional output directory override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        Self {
            alert_ratio: 0.1,
            write_csv: true,
            out_dir: None,
        }
    }
}

/// Result of a benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub out_dir: PathBuf,
    pub report_path: PathBuf,
    pub markdown_path: PathBuf,
    pub csv_path: Option<PathBuf>,
    pub report: BenchmarkReport,
    pub markdown: String,
}

use std::path::Path;

use plando_core::SchemaProvider;
use plando_weights::{WeightTable, fingerprint_table};
use tracing::info;

use crate::errors::{BenchError, Result};
use crate::expected::expected_weights;
use crate::metrics::{BENCH_VERSION, BenchmarkReport, OptionFlag, compare};
use crate::model::{BenchmarkOptions, BenchmarkResult};
use crate::report::{render_report, write_csv};
use crate::tally::tally_dir;

/// Compare a weight table against a directory of rolled seeds.
#[derive(Debug, Clone)]
pub struct BenchmarkEngine {
    options: BenchmarkOptions,
}

impl BenchmarkEngine {
    pub fn new(options: BenchmarkOptions) -> Self {
        Self { options }
    }

    pub fn run(
        &self,
        table: &WeightTable,
        schema: &dyn SchemaProvider,
        dataset_dir: &Path,
    ) -> Result<BenchmarkResult> {
        if self.options.alert_ratio.is_nan() || self.options.alert_ratio <= 0.0 {
            return Err(BenchError::InvalidInput(format!(
                "alert_ratio must be positive, got {}",
                self.options.alert_ratio
            )));
        }

        let expected = expected_weights(table, schema)?;
        let tally = tally_dir(dataset_dir, &expected)?;
        let run_id = uuid::Uuid::new_v4().to_string();

        let report = BenchmarkReport {
            bench_version: BENCH_VERSION.to_string(),
            run_id: run_id.clone(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            weights_fingerprint: fingerprint_table(table).ok(),
            files: tally.files,
            skipped_files: tally.skipped.len() as u64,
            alert_ratio: self.options.alert_ratio,
            settings: compare(&expected, &tally, self.options.alert_ratio),
        };

        let markdown = render_report(&report);
        let out_dir = self
            .options
            .out_dir
            .clone()
            .unwrap_or_else(|| dataset_dir.to_path_buf());
        std::fs::create_dir_all(&out_dir)?;

        let report_path = out_dir.join("benchmark.json");
        std::fs::write(&report_path, serde_json::to_vec_pretty(&report)?)?;

        let markdown_path = out_dir.join("benchmark.md");
        std::fs::write(&markdown_path, markdown.as_bytes())?;

        let csv_path = if self.options.write_csv {
            let path = out_dir.join("benchmark.csv");
            write_csv(&path, &report)?;
            Some(path)
        } else {
            None
        };

        info!(
            run_id = %run_id,
            seeds = report.files,
            settings = report.settings.len(),
            errors = report.flagged(OptionFlag::Error),
            alerts = report.flagged(OptionFlag::Alert),
            "benchmark completed"
        );

        Ok(BenchmarkResult {
            out_dir,
            report_path,
            markdown_path,
            csv_path,
            report,
            markdown,
        })
    }
}

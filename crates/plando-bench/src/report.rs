use std::path::Path;

use serde::Serialize;

use crate::errors::Result;
use crate::metrics::{BenchmarkReport, OptionFlag};

/// Render a deterministic markdown report.
pub fn render_report(report: &BenchmarkReport) -> String {
    let mut lines = Vec::new();

    lines.push("# Weights Benchmark Report".to_string());
    lines.push(String::new());
    lines.push("## Run summary".to_string());
    lines.push(format!("- run_id: {}", report.run_id));
    lines.push(format!("- generated_at: {}", report.generated_at));
    if let Some(fingerprint) = &report.weights_fingerprint {
        lines.push(format!("- weights_fingerprint: {fingerprint}"));
    }
    lines.push(format!("- seeds: {}", report.files));
    lines.push(format!("- skipped_files: {}", report.skipped_files));
    lines.push(format!(
        "- errors: {} / alerts: {}",
        report.flagged(OptionFlag::Error),
        report.flagged(OptionFlag::Alert)
    ));
    lines.push(String::new());
    lines.push(format!(
        "Alerts mark options deviating from their weight by more than {:.0}%. \
         Errors mark options never seen despite a non-zero weight.",
        report.alert_ratio * 100.0
    ));
    lines.push(String::new());

    for setting in &report.settings {
        let mut heading = format!("## {}", setting.setting);
        if setting.fully_disabled {
            heading.push_str(" (disabled in every seed)");
        }
        lines.push(heading);
        let chi = setting
            .chi_square
            .map(|value| format!("{value:.3}"))
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "- disabled_seeds: {} / chi_square: {}",
            setting.disabled_seeds, chi
        ));
        lines.push(String::new());
        lines.push("| option | weight | total_seeds | normalized_weight | fraction_seeds | flag |".to_string());
        lines.push("| --- | --- | --- | --- | --- | --- |".to_string());
        for option in &setting.options {
            lines.push(format!(
                "| {} | {} | {} | {:.4} | {:.4} | {} |",
                option.option,
                option.weight,
                option.total_seeds,
                option.normalized_weight,
                option.fraction_seeds,
                flag_label(option.flag)
            ));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

fn flag_label(flag: Option<OptionFlag>) -> &'static str {
    match flag {
        Some(OptionFlag::Error) => "error",
        Some(OptionFlag::Alert) => "alert",
        Some(OptionFlag::Unexpected) => "unexpected",
        None => "",
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    setting: &'a str,
    option: &'a str,
    weight: &'a str,
    total_seeds: u64,
    normalized_weight: f64,
    fraction_seeds: f64,
    disabled_seeds: u64,
    flag: &'static str,
}

/// Write one row per option.
pub fn write_csv(path: &Path, report: &BenchmarkReport) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for setting in &report.settings {
        for option in &setting.options {
            writer.serialize(CsvRow {
                setting: &setting.setting,
                option: &option.option,
                weight: &option.weight,
                total_seeds: option.total_seeds,
                normalized_weight: option.normalized_weight,
                fraction_seeds: option.fraction_seeds,
                disabled_seeds: setting.disabled_seeds,
                flag: flag_label(option.flag),
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

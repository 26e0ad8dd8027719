use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::expected::{SettingExpectation, SettingKind};
use crate::tally::Tally;

/// Benchmark report contract version.
pub const BENCH_VERSION: &str = "0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionFlag {
    /// Never observed despite a non-zero expected share.
    Error,
    /// Observed share deviates from the expected one beyond the tolerance.
    Alert,
    /// Observed but absent from the weights.
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionBench {
    pub option: String,
    pub weight: String,
    pub normalized_weight: f64,
    pub total_seeds: u64,
    pub fraction_seeds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<OptionFlag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingBench {
    pub setting: String,
    pub kind: SettingKind,
    pub disabled_seeds: u64,
    /// Absent from every seed, likely disabled by another setting.
    pub fully_disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chi_square: Option<f64>,
    pub options: Vec<OptionBench>,
}

/// Machine-readable benchmark output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub bench_version: String,
    pub run_id: String,
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights_fingerprint: Option<String>,
    pub files: u64,
    pub skipped_files: u64,
    pub alert_ratio: f64,
    pub settings: Vec<SettingBench>,
}

impl BenchmarkReport {
    pub fn flagged(&self, flag: OptionFlag) -> usize {
        self.settings
            .iter()
            .flat_map(|setting| &setting.options)
            .filter(|option| option.flag == Some(flag))
            .count()
    }
}

/// Compare expectations with observed counts.
pub fn compare(
    expected: &IndexMap<String, SettingExpectation>,
    tally: &Tally,
    alert_ratio: f64,
) -> Vec<SettingBench> {
    expected
        .iter()
        .map(|(setting, expectation)| compare_setting(setting, expectation, tally, alert_ratio))
        .collect()
}

fn compare_setting(
    setting: &str,
    expectation: &SettingExpectation,
    tally: &Tally,
    alert_ratio: f64,
) -> SettingBench {
    let disabled_seeds = tally.disabled_seeds(setting);
    let enabled = tally.enabled_seeds(setting);
    let fully_disabled = enabled == 0;

    let mut options: Vec<OptionBench> = expectation
        .options
        .iter()
        .map(|(option, expected)| {
            let total_seeds = tally.count(setting, option);
            let fraction_seeds = fraction(total_seeds, enabled);
            let normalized = expected.normalized_weight;
            let flag = if total_seeds == 0 && normalized != 0.0 && !fully_disabled {
                Some(OptionFlag::Error)
            } else if normalized != 0.0
                && total_seeds != 0
                && (fraction_seeds - normalized).abs() > normalized * alert_ratio
            {
                Some(OptionFlag::Alert)
            } else {
                None
            };
            OptionBench {
                option: option.clone(),
                weight: expected.weight.clone(),
                normalized_weight: normalized,
                total_seeds,
                fraction_seeds,
                flag,
            }
        })
        .collect();

    if let Some(observed) = tally.counts.get(setting) {
        for (option, total_seeds) in observed {
            if expectation.options.contains_key(option) {
                continue;
            }
            options.push(OptionBench {
                option: option.clone(),
                weight: "-".to_string(),
                normalized_weight: 0.0,
                total_seeds: *total_seeds,
                fraction_seeds: fraction(*total_seeds, enabled),
                flag: Some(OptionFlag::Unexpected),
            });
        }
    }

    let chi_square = match expectation.kind {
        SettingKind::Categorical if enabled > 0 => Some(chi_square(&options, enabled)),
        _ => None,
    };

    SettingBench {
        setting: setting.to_string(),
        kind: expectation.kind,
        disabled_seeds,
        fully_disabled,
        chi_square,
        options,
    }
}

fn fraction(count: u64, enabled: u64) -> f64 {
    if enabled == 0 {
        0.0
    } else {
        count as f64 / enabled as f64
    }
}

/// Pearson statistic over options with a positive expected share.
fn chi_square(options: &[OptionBench], enabled: u64) -> f64 {
    options
        .iter()
        .filter(|option| option.normalized_weight > 0.0)
        .map(|option| {
            let expected = option.normalized_weight * enabled as f64;
            let observed = option.total_seeds as f64;
            (observed - expected).powi(2) / expected
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expected::ExpectedOption;

    fn expectation(kind: SettingKind, options: &[(&str, f64)]) -> SettingExpectation {
        SettingExpectation {
            kind,
            options: options
                .iter()
                .map(|(option, normalized)| {
                    (
                        option.to_string(),
                        ExpectedOption {
                            weight: "w".to_string(),
                            normalized_weight: *normalized,
                        },
                    )
                })
                .collect(),
        }
    }

    fn tally(files: u64, disabled: u64, counts: &[(&str, u64)]) -> Tally {
        let mut tally = Tally {
            files,
            ..Tally::default()
        };
        tally.disabled.insert("setting".to_string(), disabled);
        tally.counts.insert(
            "setting".to_string(),
            counts
                .iter()
                .map(|(option, count)| (option.to_string(), *count))
                .collect(),
        );
        tally
    }

    fn bench(expectation: SettingExpectation, tally: &Tally) -> SettingBench {
        let mut expected = IndexMap::new();
        expected.insert("setting".to_string(), expectation);
        compare(&expected, tally, 0.1).remove(0)
    }

    #[test]
    fn disabled_seeds_leave_the_denominator() {
        let result = bench(
            expectation(SettingKind::Categorical, &[("a", 0.5), ("b", 0.5)]),
            &tally(100, 60, &[("a", 20), ("b", 20)]),
        );
        assert_eq!(result.disabled_seeds, 60);
        assert!((result.options[0].fraction_seeds - 0.5).abs() < 1e-9);
        assert!(result.options.iter().all(|option| option.flag.is_none()));
        assert_eq!(result.chi_square, Some(0.0));
    }

    #[test]
    fn flags_missing_and_skewed_options() {
        let result = bench(
            expectation(SettingKind::Categorical, &[("a", 0.5), ("b", 0.3), ("c", 0.2)]),
            &tally(100, 0, &[("a", 70), ("b", 30), ("d", 1)]),
        );
        let flags: Vec<_> = result
            .options
            .iter()
            .map(|option| (option.option.as_str(), option.flag))
            .collect();
        assert_eq!(
            flags,
            vec![
                ("a", Some(OptionFlag::Alert)),
                ("b", None),
                ("c", Some(OptionFlag::Error)),
                ("d", Some(OptionFlag::Unexpected)),
            ]
        );
        assert!(result.chi_square.expect("categorical") > 20.0);
    }

    #[test]
    fn fully_disabled_settings_raise_no_errors() {
        let result = bench(
            expectation(SettingKind::Multiselect, &[("a", 0.4)]),
            &tally(10, 10, &[]),
        );
        assert!(result.fully_disabled);
        assert_eq!(result.options[0].flag, None);
        assert_eq!(result.chi_square, None);
    }
}

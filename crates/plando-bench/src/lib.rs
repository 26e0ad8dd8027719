//! Benchmark weights files against generated plandos and spoiler logs.

pub mod engine;
pub mod errors;
pub mod expected;
pub mod metrics;
pub mod model;
pub mod report;
pub mod tally;

pub use engine::BenchmarkEngine;
pub use errors::{BenchError, Result};
pub use expected::{ExpectedOption, SettingExpectation, SettingKind, expected_weights};
pub use metrics::{BENCH_VERSION, BenchmarkReport, OptionBench, OptionFlag, SettingBench};
pub use model::{BenchmarkOptions, BenchmarkResult};
pub use report::{render_report, write_csv};
pub use tally::{Tally, tally_dir};

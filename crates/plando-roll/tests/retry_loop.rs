use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use plando_core::SettingsCatalog;
use plando_roll::{
    GenerationLoop, PlandoValidator, PlandoWriter, ResolutionEngine, ResolveConfig, RetryPolicy,
    RollError, ValidationOutcome,
};
use plando_weights::{ConditionalEntry, WeightTable};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Rejects the first `failures` plandos, then accepts.
struct FlakyGenerator {
    failures: u32,
    calls: u32,
    seen: Vec<PathBuf>,
}

impl FlakyGenerator {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: 0,
            seen: Vec::new(),
        }
    }
}

impl PlandoValidator for FlakyGenerator {
    fn validate(&mut self, plando: &Path) -> plando_roll::Result<ValidationOutcome> {
        self.calls += 1;
        self.seen.push(plando.to_path_buf());
        if self.calls > self.failures {
            Ok(ValidationOutcome::Accepted {
                summary: "Creating Patch File".to_string(),
            })
        } else {
            Ok(ValidationOutcome::Rejected {
                diagnostic: format!("ShuffleError: attempt {}", self.calls),
            })
        }
    }
}

fn catalog() -> SettingsCatalog {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/settings_schema.json");
    SettingsCatalog::from_path(&path).expect("load schema")
}

fn temp_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("plando_{label}_{}", uuid::Uuid::new_v4()))
}

fn table() -> WeightTable {
    let mut weights = IndexMap::new();
    weights.insert(
        "bridge".to_string(),
        [("open".to_string(), 50.0), ("stones".to_string(), 50.0)]
            .into_iter()
            .collect(),
    );
    WeightTable {
        weights,
        ..WeightTable::default()
    }
}

fn policy(max_attempts: u32, failed_dir: &Path) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        runs_per_plando: 1,
        failed_dir: Some(failed_dir.to_path_buf()),
    }
}

#[test]
fn accepts_on_the_third_attempt() {
    let catalog = catalog();
    let engine = ResolutionEngine::new(&catalog, table(), ResolveConfig::default()).expect("engine");
    let data_dir = temp_dir("data");
    let failed_dir = temp_dir("failed");
    let generation = GenerationLoop::new(&engine, PlandoWriter::new(&data_dir), policy(3, &failed_dir));
    let mut validator = FlakyGenerator::new(2);
    let mut rng = ChaCha8Rng::seed_from_u64(12);

    let outcome = generation.run(&mut validator, &mut rng).expect("accepted");
    assert_eq!(outcome.attempts, 3);
    assert_eq!(validator.calls, 3);
    assert_eq!(outcome.summary.as_deref(), Some("Creating Patch File"));

    // Each attempt drew a fresh plando; the rejected two were moved away.
    assert_eq!(validator.seen.len(), 3);
    assert_ne!(validator.seen[0], validator.seen[1]);
    assert_eq!(std::fs::read_dir(&failed_dir).expect("failed dir").count(), 2);
    assert!(outcome.plando.starts_with(&data_dir));
    assert!(outcome.plando.exists());
}

#[test]
fn gives_up_after_the_budget_with_the_last_diagnostic() {
    let catalog = catalog();
    let engine = ResolutionEngine::new(&catalog, table(), ResolveConfig::default()).expect("engine");
    let failed_dir = temp_dir("failed");
    let generation = GenerationLoop::new(
        &engine,
        PlandoWriter::new(temp_dir("data")),
        policy(2, &failed_dir),
    );
    let mut validator = FlakyGenerator::new(u32::MAX);
    let mut rng = ChaCha8Rng::seed_from_u64(13);

    let err = generation
        .run(&mut validator, &mut rng)
        .expect_err("retries exhausted");
    assert_eq!(validator.calls, 2);
    match err {
        RollError::RetriesExhausted {
            attempts,
            diagnostic,
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(diagnostic, "ShuffleError: attempt 2");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn draw_failures_consume_attempts() {
    let catalog = catalog();
    let mut weights = IndexMap::new();
    weights.insert(
        "triforce_hunt".to_string(),
        [("true".to_string(), 100.0)].into_iter().collect(),
    );
    weights.insert(
        "item_pool_value".to_string(),
        [("minimal".to_string(), 100.0)].into_iter().collect(),
    );
    let mut table = WeightTable {
        weights,
        ..WeightTable::default()
    };
    table.conditionals.insert(
        "exclude_minimal_triforce_hunt".to_string(),
        ConditionalEntry::new(true, Vec::new()),
    );
    let engine = ResolutionEngine::new(&catalog, table, ResolveConfig::default()).expect("engine");
    let generation = GenerationLoop::new(
        &engine,
        PlandoWriter::new(temp_dir("data")),
        policy(4, &temp_dir("failed")),
    );
    let mut validator = FlakyGenerator::new(0);
    let mut rng = ChaCha8Rng::seed_from_u64(14);

    let err = generation
        .run(&mut validator, &mut rng)
        .expect_err("every draw fails");
    assert!(matches!(err, RollError::RetriesExhausted { attempts: 4, .. }));
    assert_eq!(validator.calls, 0);
}

//! Weights file contracts, validation and override merging.
//!
//! A weights document is validated structurally against its generated JSON
//! Schema, parsed, checked against the settings schema, and normalized into a
//! [`WeightTable`] (base files) or a [`WeightOverride`] (override files).

pub mod balanced;
pub mod drift;
pub mod errors;
pub mod fingerprint;
pub mod load;
pub mod merge;
pub mod model;
pub mod validate;

pub use balanced::balanced_weights;
pub use drift::{DriftReport, OptionDrift, check_setting_drift};
pub use errors::{IssueSeverity, ValidationIssue, ValidationReport, WeightsError};
pub use fingerprint::fingerprint_table;
pub use load::{LoadedWeights, WeightsSource, apply_overrides, load_weights};
pub use merge::{OptionPatch, compose, merge};
pub use model::{
    ConditionalEntry, ConditionalSpec, MultiselectSpec, MultiselectWeight, WeightEntry,
    WeightOverride, WeightTable, WeightsDocument,
};
pub use validate::{
    ValidatedWeights, validate_base_weights, validate_override_weights, validate_weights_json,
    weights_json_schema,
};

/// Contract version for weights documents.
pub const WEIGHTS_VERSION: &str = "0.1";

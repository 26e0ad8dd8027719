//! Core contracts and helpers for plando.
//!
//! This crate defines the settings schema consumed by the resolution engine,
//! the typed values it produces, and the validation helpers shared across the
//! weights loader, the roller and the CLI.

pub mod error;
pub mod graph;
pub mod schema;
pub mod validation;
pub mod value;

pub use error::{Error, Result};
pub use graph::{DisableGraphReport, DisableGraphSummary, build_disable_graph_report};
pub use schema::{
    Disables, PoolItem, SchemaProvider, SettingInfo, SettingType, SettingsCatalog, SettingsSchema,
};
pub use validation::validate_schema;
pub use value::{ResolvedSettings, SettingValue};

/// Current contract version for settings schema files.
pub const SCHEMA_VERSION: &str = "0.1";

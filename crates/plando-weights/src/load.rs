use std::convert::Infallible;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;

use plando_core::SchemaProvider;
use serde_json::Value;

use crate::errors::{Result, ValidationIssue, WeightsError};
use crate::fingerprint::fingerprint_table;
use crate::merge::{compose, merge};
use crate::model::{WeightOverride, WeightTable};
use crate::validate::{validate_base_weights, validate_override_weights, weights_json_schema};

/// Where a weights document is read from; `-` selects standard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightsSource {
    Path(PathBuf),
    Stdin,
}

impl WeightsSource {
    pub fn read_json(&self) -> Result<Value> {
        let contents = match self {
            WeightsSource::Path(path) => {
                if !path.is_file() {
                    return Err(WeightsError::MissingFile(path.clone()));
                }
                std::fs::read_to_string(path)?
            }
            WeightsSource::Stdin => {
                let mut contents = String::new();
                std::io::stdin().read_to_string(&mut contents)?;
                contents
            }
        };
        Ok(serde_json::from_str(&contents)?)
    }
}

impl FromStr for WeightsSource {
    type Err = Infallible;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Ok(if value == "-" {
            WeightsSource::Stdin
        } else {
            WeightsSource::Path(PathBuf::from(value))
        })
    }
}

impl fmt::Display for WeightsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightsSource::Path(path) => write!(f, "{}", path.display()),
            WeightsSource::Stdin => f.write_str("<stdin>"),
        }
    }
}

/// Effective weights after all override layers were applied.
#[derive(Debug, Clone)]
pub struct LoadedWeights {
    pub table: WeightTable,
    pub warnings: Vec<ValidationIssue>,
    pub sources: Vec<String>,
    pub fingerprint: String,
}

/// Load a base weights file and apply overrides in order.
pub fn load_weights(
    base: &WeightsSource,
    overrides: &[WeightsSource],
    schema: &dyn SchemaProvider,
) -> Result<LoadedWeights> {
    let weights_schema = weights_json_schema()?;
    let validated = validate_base_weights(&base.read_json()?, &weights_schema, schema).map_err(
        |report| WeightsError::Invalid {
            name: base.to_string(),
            report,
        },
    )?;

    let mut loaded = apply_overrides(validated.table, overrides, schema)?;
    loaded.sources.insert(0, base.to_string());
    let mut warnings = validated.warnings;
    warnings.append(&mut loaded.warnings);
    loaded.warnings = warnings;
    Ok(loaded)
}

/// Apply override files onto an already built base table.
pub fn apply_overrides(
    base: WeightTable,
    overrides: &[WeightsSource],
    schema: &dyn SchemaProvider,
) -> Result<LoadedWeights> {
    let weights_schema = weights_json_schema()?;
    let mut warnings = Vec::new();
    let mut sources = Vec::new();
    let mut combined: Option<WeightOverride> = None;

    for source in overrides {
        let validated = validate_override_weights(&source.read_json()?, &weights_schema, schema)
            .map_err(|report| WeightsError::Invalid {
                name: source.to_string(),
                report,
            })?;
        warnings.extend(validated.warnings);
        sources.push(source.to_string());
        combined = Some(match combined {
            Some(layer) => compose(&layer, &validated.table)?,
            None => validated.table,
        });
    }

    let table = match &combined {
        Some(layer) => merge(&base, layer)?,
        None => base,
    };
    let fingerprint = fingerprint_table(&table)?;

    Ok(LoadedWeights {
        table,
        warnings,
        sources,
        fingerprint,
    })
}

use indexmap::IndexMap;
use jsonschema::JSONSchema;
use plando_core::{SchemaProvider, SettingInfo, SettingType};
use schemars::schema_for;
use serde_json::{Map, Value};

use crate::errors::{ValidationIssue, ValidationReport, WeightsError};
use crate::merge::OptionPatch;
use crate::model::{
    ConditionalEntry, ConditionalSpec, MultiselectWeight, WeightEntry, WeightOverride,
    WeightTable, WeightsDocument,
};

/// Validated weights with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedWeights<T> {
    pub table: T,
    pub warnings: Vec<ValidationIssue>,
}

/// JSON Schema describing the weights document layout.
pub fn weights_json_schema() -> Result<Value, WeightsError> {
    Ok(serde_json::to_value(schema_for!(WeightsDocument))?)
}

/// Validate a weights JSON document against the weights JSON Schema.
pub fn validate_weights_json(
    weights_json: &Value,
    weights_schema: &Value,
) -> Result<ValidationReport, WeightsError> {
    let compiled = JSONSchema::compile(weights_schema)
        .map_err(|err| WeightsError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(weights_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push_error(ValidationIssue::error(
                "schema_violation",
                path,
                error.to_string(),
            ));
        }
    }

    Ok(report)
}

/// Validate a base weights file end-to-end.
pub fn validate_base_weights(
    weights_json: &Value,
    weights_schema: &Value,
    schema: &dyn SchemaProvider,
) -> Result<ValidatedWeights<WeightTable>, ValidationReport> {
    let document = parse_document(weights_json, weights_schema)?;
    let mut report = ValidationReport::default();
    let parts = normalize(document, &mut report);

    if parts.weights.is_empty() && parts.multiselect.is_empty() {
        report.push_error(
            ValidationIssue::error(
                "weights_missing",
                "/weights",
                "base weights define no settings",
            )
            .with_hint("add a weights section with at least one setting"),
        );
    }

    check_parts(&parts, schema, &mut report);

    let mut options = Map::new();
    match OptionPatch::from_options(&parts.options) {
        Ok(patches) => {
            for (key, patch) in patches {
                match patch.apply(&key, options.get(&key)) {
                    Ok(Some(value)) => {
                        options.insert(key, value);
                    }
                    Ok(None) => {}
                    Err(err) => report.push_error(ValidationIssue::error(
                        "invalid_option_patch",
                        format!("/options/{key}"),
                        err.to_string(),
                    )),
                }
            }
        }
        Err(err) => report.push_error(ValidationIssue::error(
            "invalid_option_patch",
            "/options",
            err.to_string(),
        )),
    }

    if !report.is_ok() {
        return Err(report);
    }

    Ok(ValidatedWeights {
        table: WeightTable {
            weights: parts.weights,
            multiselect: parts.multiselect,
            options,
            conditionals: parts.conditionals,
            start_with: parts.start_with,
        },
        warnings: report.warnings,
    })
}

/// Validate an override weights file end-to-end.
pub fn validate_override_weights(
    weights_json: &Value,
    weights_schema: &Value,
    schema: &dyn SchemaProvider,
) -> Result<ValidatedWeights<WeightOverride>, ValidationReport> {
    let document = parse_document(weights_json, weights_schema)?;
    let mut report = ValidationReport::default();
    let parts = normalize(document, &mut report);

    check_parts(&parts, schema, &mut report);

    let options = match OptionPatch::from_options(&parts.options) {
        Ok(patches) => patches,
        Err(err) => {
            report.push_error(ValidationIssue::error(
                "invalid_option_patch",
                "/options",
                err.to_string(),
            ));
            IndexMap::new()
        }
    };

    if !report.is_ok() {
        return Err(report);
    }

    Ok(ValidatedWeights {
        table: WeightOverride {
            weights: parts.weights,
            multiselect: parts.multiselect,
            options,
            conditionals: parts.conditionals,
            start_with: parts.start_with,
        },
        warnings: report.warnings,
    })
}

fn parse_document(
    weights_json: &Value,
    weights_schema: &Value,
) -> Result<WeightsDocument, ValidationReport> {
    let structural = match validate_weights_json(weights_json, weights_schema) {
        Ok(report) => report,
        Err(err) => {
            return Err(ValidationReport::single(ValidationIssue::error(
                "schema_validation_error",
                "/",
                err.to_string(),
            )));
        }
    };

    if !structural.is_ok() {
        return Err(structural);
    }

    serde_json::from_value(weights_json.clone()).map_err(|err| {
        ValidationReport::single(ValidationIssue::error(
            "invalid_weights_json",
            "/",
            err.to_string(),
        ))
    })
}

/// Document split into the sections the engine consumes.
struct Parts {
    weights: IndexMap<String, IndexMap<String, f64>>,
    multiselect: IndexMap<String, MultiselectWeight>,
    start_with: IndexMap<String, Vec<String>>,
    conditionals: IndexMap<String, ConditionalEntry>,
    options: Map<String, Value>,
}

fn normalize(document: WeightsDocument, report: &mut ValidationReport) -> Parts {
    let WeightsDocument {
        mut options,
        conditionals,
        multiselect: explicit_multiselect,
        weights: entries,
    } = document;

    let mut weights = IndexMap::new();
    let mut multiselect = IndexMap::new();
    let mut start_with = IndexMap::new();

    for (name, entry) in entries {
        match entry {
            WeightEntry::Options(options) => {
                weights.insert(name, options);
            }
            WeightEntry::Multiselect(spec) => {
                multiselect.insert(name, MultiselectWeight::Spec(spec));
            }
            WeightEntry::Items(items) => {
                start_with.insert(name, items);
            }
        }
    }

    for (name, spec) in explicit_multiselect {
        if multiselect.contains_key(&name) {
            report.push_warning(ValidationIssue::warning(
                "duplicate_multiselect",
                format!("/weights/{name}"),
                format!("multiselect section overrides the inline spec for {name}"),
            ));
        }
        weights.shift_remove(&name);
        multiselect.insert(name, spec);
    }

    let mut specs: IndexMap<String, ConditionalSpec> = IndexMap::new();
    if let Some(nested) = options.shift_remove("conditionals") {
        match serde_json::from_value::<IndexMap<String, ConditionalSpec>>(nested) {
            Ok(nested) => specs.extend(nested),
            Err(err) => report.push_error(ValidationIssue::error(
                "invalid_conditionals",
                "/options/conditionals",
                err.to_string(),
            )),
        }
    }
    specs.extend(conditionals);

    let mut entries = IndexMap::new();
    for (name, spec) in specs {
        let entry = match spec {
            ConditionalSpec::Flag(enabled) => ConditionalEntry::new(enabled, Vec::new()),
            ConditionalSpec::List(mut items) => {
                if items.is_empty() || !items[0].is_boolean() {
                    report.push_error(
                        ValidationIssue::error(
                            "invalid_conditional",
                            format!("/conditionals/{name}"),
                            "conditional must start with an enabled flag",
                        )
                        .with_hint("write the rule as [true, ...params] or [false]"),
                    );
                    continue;
                }
                let enabled = items.remove(0).as_bool().unwrap_or(false);
                ConditionalEntry::new(enabled, items)
            }
        };
        entries.insert(name, entry);
    }

    Parts {
        weights,
        multiselect,
        start_with,
        conditionals: entries,
        options,
    }
}

fn check_parts(parts: &Parts, schema: &dyn SchemaProvider, report: &mut ValidationReport) {
    for (name, options) in &parts.weights {
        check_categorical(name, options, schema, report);
    }
    for (name, spec) in &parts.multiselect {
        check_multiselect(name, spec, schema, report);
    }
    for (pool, items) in &parts.start_with {
        check_start_with(pool, items, schema, report);
    }
    check_options(&parts.options, schema, report);
}

fn known_setting<'a>(
    name: &str,
    path: &str,
    schema: &'a dyn SchemaProvider,
    report: &mut ValidationReport,
) -> Option<&'a SettingInfo> {
    let setting = schema.setting(name);
    if setting.is_none() {
        report.push_error(
            ValidationIssue::error(
                "unknown_setting",
                path,
                format!("setting '{name}' not found in the settings schema"),
            )
            .with_hint("remove the entry or update the settings schema"),
        );
    }
    setting
}

fn check_categorical(
    name: &str,
    options: &IndexMap<String, f64>,
    schema: &dyn SchemaProvider,
    report: &mut ValidationReport,
) {
    let path = format!("/weights/{name}");
    let Some(setting) = known_setting(name, &path, schema, report) else {
        return;
    };

    if !setting.randomizable {
        report.push_error(ValidationIssue::error(
            "not_randomizable",
            path.clone(),
            format!("setting '{name}' cannot be randomized"),
        ));
        return;
    }

    if setting.setting_type == SettingType::List {
        report.push_error(
            ValidationIssue::error(
                "list_setting_weights",
                path.clone(),
                format!("list setting '{name}' cannot take categorical weights"),
            )
            .with_hint("move the entry under multiselect"),
        );
        return;
    }

    let mut total = 0.0;
    for (option, weight) in options {
        let option_path = format!("{path}/{option}");
        if !setting.accepts_option(option) {
            report.push_error(ValidationIssue::error(
                "unknown_option",
                option_path.clone(),
                format!("'{option}' is not an option of '{name}'"),
            ));
        }
        if !weight.is_finite() || *weight < 0.0 {
            report.push_error(ValidationIssue::error(
                "negative_weight",
                option_path,
                format!("weight for '{option}' must be a non-negative number"),
            ));
        } else {
            total += weight;
        }
    }

    if total <= 0.0 {
        report.push_error(
            ValidationIssue::error(
                "empty_weights",
                path,
                format!("setting '{name}' has no option with a positive weight"),
            )
            .with_hint("give at least one option a weight above zero"),
        );
    }
}

fn check_multiselect(
    name: &str,
    spec: &MultiselectWeight,
    schema: &dyn SchemaProvider,
    report: &mut ValidationReport,
) {
    let path = format!("/multiselect/{name}");
    let Some(setting) = known_setting(name, &path, schema, report) else {
        return;
    };

    if setting.setting_type != SettingType::List {
        report.push_error(ValidationIssue::error(
            "not_a_list",
            path.clone(),
            format!("multiselect setting '{name}' must be a list setting"),
        ));
        return;
    }

    if !setting.randomizable {
        report.push_error(
            ValidationIssue::error(
                "not_randomizable",
                path.clone(),
                format!("setting '{name}' is always empty and cannot be a multiselect"),
            )
            .with_hint("remove the multiselect entry"),
        );
        return;
    }

    check_percentage(
        spec.global_enable_percentage(),
        &format!("{path}/global_enable_percentage"),
        report,
    );

    if let Some(opt_percentage) = spec.opt_percentage() {
        if spec.is_geometric() {
            report.push_warning(ValidationIssue::warning(
                "opt_percentage_ignored",
                format!("{path}/opt_percentage"),
                "geometric multiselects ignore opt_percentage",
            ));
        }
        for (option, pct) in opt_percentage {
            let option_path = format!("{path}/opt_percentage/{option}");
            if !setting.choices.iter().any(|choice| choice == option) {
                report.push_error(ValidationIssue::error(
                    "unknown_option",
                    option_path.clone(),
                    format!("'{option}' is not an option of '{name}'"),
                ));
            }
            check_percentage(*pct, &option_path, report);
        }
    }
}

fn check_percentage(pct: f64, path: &str, report: &mut ValidationReport) {
    if !(0.0..=100.0).contains(&pct) {
        report.push_error(ValidationIssue::error(
            "invalid_percentage",
            path,
            format!("percentage {pct} must be within 0..=100"),
        ));
    }
}

fn check_start_with(
    pool: &str,
    items: &[String],
    schema: &dyn SchemaProvider,
    report: &mut ValidationReport,
) {
    let path = format!("/weights/{pool}");
    let Some(pool_items) = schema.starting_pool(pool) else {
        report.push_error(
            ValidationIssue::error(
                "unknown_pool",
                path,
                format!("'{pool}' is not a starting pool"),
            )
            .with_hint("only starting pool settings accept item lists under weights"),
        );
        return;
    };

    for (idx, item) in items.iter().enumerate() {
        if !pool_items.iter().any(|candidate| candidate.name() == item) {
            report.push_error(ValidationIssue::error(
                "unknown_pool_item",
                format!("{path}/{idx}"),
                format!("'{item}' is not part of the {pool} pool"),
            ));
        }
    }
}

fn check_options(
    options: &Map<String, Value>,
    schema: &dyn SchemaProvider,
    report: &mut ValidationReport,
) {
    for (key, value) in options {
        let path = format!("/options/{key}");

        if key.starts_with("remove_") && !value.is_array() && !value.is_string() {
            report.push_error(ValidationIssue::error(
                "invalid_remove",
                path.clone(),
                "remove_ options take a list of values",
            ));
        }

        if key == "starting_items" && !value.is_boolean() {
            report.push_error(ValidationIssue::error(
                "invalid_option",
                path.clone(),
                "starting_items must be true or false",
            ));
        }

        let bound = key.strip_suffix("_min").or_else(|| key.strip_suffix("_max"));
        if let Some(setting) = bound.and_then(|name| schema.setting(name))
            && setting.setting_type == SettingType::Int
        {
            match value.as_i64() {
                Some(number) if setting.accepts_option(&number.to_string()) => {}
                Some(number) => report.push_error(ValidationIssue::error(
                    "bound_out_of_range",
                    path,
                    format!("{number} is outside the range of '{}'", setting.name),
                )),
                None => report.push_error(ValidationIssue::error(
                    "invalid_bound",
                    path,
                    format!("{key} must be an integer"),
                )),
            }
        }
    }
}

fn normalized_json_pointer(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

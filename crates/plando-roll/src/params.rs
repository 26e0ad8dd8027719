use serde_json::Value;

use crate::errors::{Result, RollError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    /// Number within `0..=100`.
    Percentage,
    String,
    /// A string or a list of strings.
    Strings,
    /// `setting:value` pair.
    Pair,
    /// Slash separated integer weights, e.g. `40/40/20`.
    Split,
}

/// Positional parameter of a conditional rule.
#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub const fn new(key: &'static str, kind: ParamKind, required: bool) -> Self {
        Self {
            key,
            kind,
            required,
        }
    }
}

pub struct ParamList<'a> {
    values: &'a [Value],
}

pub fn validate_params<'a>(
    params: &'a [Value],
    specs: &[ParamSpec],
    ctx: &'static str,
) -> Result<ParamList<'a>> {
    if params.len() > specs.len() {
        return Err(RollError::invalid_params(
            ctx,
            format!("expected at most {} params, got {}", specs.len(), params.len()),
        ));
    }

    for (idx, spec) in specs.iter().enumerate() {
        match params.get(idx) {
            Some(value) => validate_kind(ctx, spec, value)?,
            None if spec.required => {
                return Err(RollError::invalid_params(
                    ctx,
                    format!("missing required param '{}'", spec.key),
                ));
            }
            None => {}
        }
    }

    Ok(ParamList { values: params })
}

/// Validate a variable-length list of `setting:value` pairs.
pub fn validate_pairs(params: &[Value], min: usize, ctx: &'static str) -> Result<Vec<Pair>> {
    if params.len() < min {
        return Err(RollError::invalid_params(
            ctx,
            format!("expected at least {min} setting:value pairs"),
        ));
    }
    params
        .iter()
        .map(|value| {
            value
                .as_str()
                .and_then(Pair::parse)
                .ok_or_else(|| RollError::invalid_params(ctx, format!("invalid pair {value}")))
        })
        .collect()
}

/// `setting:value` pair used by single-winner rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pair {
    pub setting: String,
    pub value: String,
}

impl Pair {
    pub fn parse(raw: &str) -> Option<Self> {
        let (setting, value) = raw.split_once(':')?;
        if setting.is_empty() || value.is_empty() {
            return None;
        }
        Some(Self {
            setting: setting.to_string(),
            value: value.to_string(),
        })
    }
}

impl<'a> ParamList<'a> {
    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        self.values.get(idx).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, idx: usize) -> Option<f64> {
        self.values.get(idx).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, idx: usize) -> Option<bool> {
        self.values.get(idx).and_then(Value::as_bool)
    }

    pub fn get_str(&self, idx: usize) -> Option<&'a str> {
        self.values.get(idx).and_then(Value::as_str)
    }

    pub fn get_strings(&self, idx: usize) -> Vec<&'a str> {
        match self.values.get(idx) {
            Some(Value::String(value)) => vec![value.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn get_split(&self, idx: usize) -> Option<Vec<f64>> {
        self.get_str(idx).and_then(parse_split)
    }
}

/// Parse `a/b/c` into weights; every part must be a non-negative integer.
pub fn parse_split(raw: &str) -> Option<Vec<f64>> {
    raw.split('/')
        .map(|part| part.trim().parse::<u32>().ok().map(f64::from))
        .collect()
}

fn validate_kind(ctx: &'static str, spec: &ParamSpec, value: &Value) -> Result<()> {
    let valid = match spec.kind {
        ParamKind::Bool => value.is_boolean(),
        ParamKind::Int => value.as_i64().is_some(),
        ParamKind::Percentage => value
            .as_f64()
            .is_some_and(|pct| (0.0..=100.0).contains(&pct)),
        ParamKind::String => value.as_str().is_some_and(|text| !text.is_empty()),
        ParamKind::Strings => match value {
            Value::String(text) => !text.is_empty(),
            Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_string),
            _ => false,
        },
        ParamKind::Pair => value.as_str().and_then(Pair::parse).is_some(),
        ParamKind::Split => value
            .as_str()
            .and_then(parse_split)
            .is_some_and(|parts| parts.len() == 3 && parts.iter().sum::<f64>() > 0.0),
    };

    if valid {
        Ok(())
    } else {
        Err(RollError::invalid_params(
            ctx,
            format!("invalid value for param '{}'", spec.key),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SPECS: &[ParamSpec] = &[
        ParamSpec::new("chance", ParamKind::Percentage, true),
        ParamSpec::new("split", ParamKind::Split, true),
    ];

    #[test]
    fn positional_params_are_checked() {
        let params = vec![json!(20), json!("40/40/20")];
        let list = validate_params(&params, SPECS, "dynamic_heart_wincon").expect("valid");
        assert_eq!(list.get_f64(0), Some(20.0));
        assert_eq!(list.get_split(1), Some(vec![40.0, 40.0, 20.0]));

        assert!(validate_params(&[json!(120), json!("1/1/1")], SPECS, "x").is_err());
        assert!(validate_params(&[json!(20)], SPECS, "x").is_err());
        assert!(validate_params(&[json!(20), json!("1/1")], SPECS, "x").is_err());
        assert!(validate_params(&[json!(20), json!("1/1/1"), json!(3)], SPECS, "x").is_err());
    }

    #[test]
    fn pairs_parse_setting_and_value() {
        let pairs = validate_pairs(
            &[json!("shuffle_interior_entrances:off"), json!("shuffle_grotto_entrances:false")],
            2,
            "single_winner",
        )
        .expect("pairs");
        assert_eq!(pairs[0].setting, "shuffle_interior_entrances");
        assert_eq!(pairs[1].value, "false");
        assert!(validate_pairs(&[json!("a:b")], 2, "single_winner").is_err());
        assert!(validate_pairs(&[json!("a"), json!("b:c")], 2, "single_winner").is_err());
    }
}

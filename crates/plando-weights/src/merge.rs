use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, WeightsError};
use crate::model::{WeightOverride, WeightTable};

const EXTRA_PREFIX: &str = "extra_";
const REMOVE_PREFIX: &str = "remove_";

/// Pending edit of one option key.
///
/// Applied in order: `replace`, then the `extra` union, then `remove`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<Value>,
}

impl OptionPatch {
    /// Group raw option keys by the option they edit.
    pub fn from_options(options: &Map<String, Value>) -> Result<IndexMap<String, OptionPatch>> {
        let mut patches: IndexMap<String, OptionPatch> = IndexMap::new();

        for (key, value) in options {
            if let Some(target) = key.strip_prefix(EXTRA_PREFIX) {
                let patch = patches.entry(target.to_string()).or_default();
                patch.extra = Some(match patch.extra.take() {
                    Some(existing) => union(target, existing, value)?,
                    None => value.clone(),
                });
            } else if let Some(target) = key.strip_prefix(REMOVE_PREFIX) {
                let items = match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                let patch = patches.entry(target.to_string()).or_default();
                push_unique(&mut patch.remove, items);
            } else {
                patches.entry(key.clone()).or_default().replace = Some(value.clone());
            }
        }

        Ok(patches)
    }

    /// Apply the patch to the current value of `key`.
    pub fn apply(&self, key: &str, current: Option<&Value>) -> Result<Option<Value>> {
        let mut value = self.replace.clone().or_else(|| current.cloned());

        if let Some(extra) = &self.extra {
            value = Some(match value {
                Some(base) => union(key, base, extra)?,
                None => extra.clone(),
            });
        }

        if !self.remove.is_empty()
            && let Some(value) = value.as_mut()
        {
            subtract(key, value, &self.remove)?;
        }

        Ok(value)
    }

    /// Compose `self` followed by `next` into a single patch.
    pub fn then(&self, key: &str, next: &OptionPatch) -> Result<OptionPatch> {
        if next.replace.is_some() {
            return Ok(next.clone());
        }

        if self.replace.is_some() {
            let first = self.apply(key, None)?;
            return Ok(OptionPatch {
                replace: next.apply(key, first.as_ref())?,
                extra: None,
                remove: Vec::new(),
            });
        }

        let mut extra = match &self.extra {
            Some(first) => {
                let mut first = first.clone();
                subtract(key, &mut first, &self.remove)?;
                Some(first)
            }
            None => None,
        };
        if let Some(second) = &next.extra {
            extra = Some(match extra {
                Some(first) => union(key, first, second)?,
                None => second.clone(),
            });
        }
        if let Some(extra) = extra.as_mut() {
            subtract(key, extra, &next.remove)?;
        }

        let readded = next.extra.as_ref().map(members).unwrap_or_default();
        let mut remove: Vec<Value> = self
            .remove
            .iter()
            .filter(|item| !readded.contains(item))
            .cloned()
            .collect();
        push_unique(&mut remove, next.remove.iter().cloned());

        Ok(OptionPatch {
            replace: None,
            extra,
            remove,
        })
    }

    /// Write the patch back as raw option keys.
    pub fn write_options(&self, key: &str, out: &mut Map<String, Value>) {
        if let Some(value) = &self.replace {
            out.insert(key.to_string(), value.clone());
        }
        if let Some(extra) = &self.extra {
            out.insert(format!("{EXTRA_PREFIX}{key}"), extra.clone());
        }
        if !self.remove.is_empty() {
            out.insert(
                format!("{REMOVE_PREFIX}{key}"),
                Value::Array(self.remove.clone()),
            );
        }
    }
}

/// Merge one override layer onto an effective table.
pub fn merge(base: &WeightTable, layer: &WeightOverride) -> Result<WeightTable> {
    let mut table = base.clone();

    for (setting, options) in &layer.weights {
        table.multiselect.shift_remove(setting);
        table.weights.insert(setting.clone(), options.clone());
    }
    for (setting, spec) in &layer.multiselect {
        table.weights.shift_remove(setting);
        table.multiselect.insert(setting.clone(), spec.clone());
    }

    for (key, patch) in &layer.options {
        if let Some(value) = patch.apply(key, table.options.get(key))? {
            table.options.insert(key.clone(), value);
        }
    }

    for (name, entry) in &layer.conditionals {
        table.conditionals.insert(name.clone(), entry.clone());
    }

    for (pool, items) in &layer.start_with {
        let target = table.start_with.entry(pool.clone()).or_default();
        push_unique(target, items.iter().cloned());
    }

    Ok(table)
}

/// Fold two override layers into one equivalent layer.
pub fn compose(first: &WeightOverride, second: &WeightOverride) -> Result<WeightOverride> {
    let mut layer = first.clone();

    for (setting, options) in &second.weights {
        layer.multiselect.shift_remove(setting);
        layer.weights.insert(setting.clone(), options.clone());
    }
    for (setting, spec) in &second.multiselect {
        layer.weights.shift_remove(setting);
        layer.multiselect.insert(setting.clone(), spec.clone());
    }

    for (key, patch) in &second.options {
        let composed = match layer.options.get(key) {
            Some(existing) => existing.then(key, patch)?,
            None => patch.clone(),
        };
        layer.options.insert(key.clone(), composed);
    }

    for (name, entry) in &second.conditionals {
        layer.conditionals.insert(name.clone(), entry.clone());
    }

    for (pool, items) in &second.start_with {
        let target = layer.start_with.entry(pool.clone()).or_default();
        push_unique(target, items.iter().cloned());
    }

    Ok(layer)
}

fn union(key: &str, base: Value, extra: &Value) -> Result<Value> {
    match (base, extra) {
        (Value::Array(mut items), Value::Array(extra)) => {
            push_unique(&mut items, extra.iter().cloned());
            Ok(Value::Array(items))
        }
        (Value::Object(mut map), Value::Object(extra)) => {
            for (name, value) in extra {
                map.insert(name.clone(), value.clone());
            }
            Ok(Value::Object(map))
        }
        _ => Err(WeightsError::Merge {
            key: key.to_string(),
            message: "extra values only combine lists with lists or objects with objects"
                .to_string(),
        }),
    }
}

fn subtract(key: &str, value: &mut Value, remove: &[Value]) -> Result<()> {
    if remove.is_empty() {
        return Ok(());
    }
    match value {
        Value::Array(items) => {
            items.retain(|item| !remove.contains(item));
            Ok(())
        }
        Value::Object(map) => {
            for name in remove.iter().filter_map(Value::as_str) {
                map.shift_remove(name);
            }
            Ok(())
        }
        _ => Err(WeightsError::Merge {
            key: key.to_string(),
            message: "remove only applies to lists and objects".to_string(),
        }),
    }
}

/// List items or object keys, as comparable values.
fn members(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map.keys().map(|key| Value::String(key.clone())).collect(),
        other => vec![other.clone()],
    }
}

fn push_unique<T: PartialEq>(target: &mut Vec<T>, items: impl IntoIterator<Item = T>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patches(value: Value) -> IndexMap<String, OptionPatch> {
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        OptionPatch::from_options(&map).expect("parse patches")
    }

    #[test]
    fn extra_unions_without_duplicates() {
        let patch = &patches(json!({"extra_tricks": ["b", "c"]}))["tricks"];
        let value = patch
            .apply("tricks", Some(&json!(["a", "b"])))
            .expect("apply");
        assert_eq!(value, Some(json!(["a", "b", "c"])));
    }

    #[test]
    fn extra_updates_objects_and_remove_drops_keys() {
        let layer = patches(json!({
            "extra_hint_dist": {"woth": 5},
            "remove_hint_dist": ["barren"]
        }));
        let value = layer["hint_dist"]
            .apply("hint_dist", Some(&json!({"barren": 2, "woth": 3})))
            .expect("apply");
        assert_eq!(value, Some(json!({"woth": 5})));
    }

    #[test]
    fn replace_runs_before_extra_and_remove() {
        let layer = patches(json!({
            "remove_misc_hints": ["altar"],
            "misc_hints": ["altar", "ganondorf"],
            "extra_misc_hints": ["warp_songs"]
        }));
        let value = layer["misc_hints"]
            .apply("misc_hints", Some(&json!(["20_skulltulas"])))
            .expect("apply");
        assert_eq!(value, Some(json!(["ganondorf", "warp_songs"])));
    }

    #[test]
    fn extra_onto_scalar_is_an_error() {
        let layer = patches(json!({"extra_starting_items": [true]}));
        let err = layer["starting_items"]
            .apply("starting_items", Some(&json!(true)))
            .expect_err("scalar union should fail");
        assert!(matches!(err, WeightsError::Merge { .. }));
    }

    #[test]
    fn composed_patch_readds_removed_items() {
        let first = &patches(json!({"remove_tricks": ["a"]}))["tricks"];
        let second = &patches(json!({"extra_tricks": ["a"]}))["tricks"];
        let composed = first.then("tricks", second).expect("compose");

        let base = json!(["a", "b"]);
        let sequential = second
            .apply("tricks", first.apply("tricks", Some(&base)).expect("first").as_ref())
            .expect("second");
        let single = composed.apply("tricks", Some(&base)).expect("composed");

        let mut sequential: Vec<_> = members(&sequential.expect("value"));
        let mut single: Vec<_> = members(&single.expect("value"));
        sequential.sort_by_key(ToString::to_string);
        single.sort_by_key(ToString::to_string);
        assert_eq!(sequential, single);
    }
}

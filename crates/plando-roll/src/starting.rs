use indexmap::IndexMap;
use plando_core::{ResolvedSettings, SchemaProvider, SettingValue};
use rand::RngCore;

use crate::draw::geometric_sample;
use crate::errors::Result;

/// Draw every starting pool with a geometric count.
///
/// Gated items are only eligible when their gate list already contains them.
pub fn draw_starting_pools(
    schema: &dyn SchemaProvider,
    settings: &ResolvedSettings,
    rng: &mut dyn RngCore,
) -> Result<IndexMap<String, Vec<String>>> {
    let mut drawn = IndexMap::new();
    for pool in schema.starting_pool_names() {
        let Some(items) = schema.starting_pool(pool) else {
            continue;
        };
        let eligible: Vec<String> = items
            .iter()
            .filter(|item| match item.gated_by() {
                Some(gate) => settings
                    .get(gate)
                    .and_then(SettingValue::as_list)
                    .is_some_and(|selected| selected.iter().any(|name| name == item.name())),
                None => true,
            })
            .map(|item| item.name().to_string())
            .collect();
        drawn.insert(pool.to_string(), geometric_sample(&eligible, rng)?);
    }
    Ok(drawn)
}

/// Union accumulated extra items into the pool settings, keeping order.
pub fn merge_extra_items(
    settings: &mut ResolvedSettings,
    extra_items: &IndexMap<String, Vec<String>>,
) {
    for (pool, items) in extra_items {
        if items.is_empty() {
            continue;
        }
        let entry = settings
            .entry(pool.clone())
            .or_insert_with(|| SettingValue::List(Vec::new()));
        if let SettingValue::List(current) = entry {
            for item in items {
                if !current.contains(item) {
                    current.push(item.clone());
                }
            }
        } else {
            *entry = SettingValue::List(items.clone());
        }
    }
}

use plando_core::{ResolvedSettings, SchemaProvider, SettingType, SettingValue};
use plando_weights::WeightTable;
use rand::RngCore;
use serde_json::Value;
use tracing::{debug, info};

use crate::coerce::coerce_settings;
use crate::conditionals::{RuleContext, RulePlan, RuleRegistry, RuleScope};
use crate::config::ResolveConfig;
use crate::draw::{uniform_range_weights, weighted_choice};
use crate::errors::{Result, RollError};
use crate::multiselect::resolve_multiselects;
use crate::prune::prune;
use crate::starting::{draw_starting_pools, merge_extra_items};

/// Output of one resolution attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub settings: ResolvedSettings,
    /// Settings removed by the pruner, in removal order.
    pub pruned: Vec<String>,
}

/// Turns an effective weight table into resolved settings.
///
/// Construction validates everything that does not depend on randomness, so
/// [`ResolutionEngine::resolve`] only fails with attempt-scoped errors.
pub struct ResolutionEngine<'s> {
    schema: &'s dyn SchemaProvider,
    table: WeightTable,
    config: ResolveConfig,
    plan: RulePlan,
}

impl<'s> ResolutionEngine<'s> {
    pub fn new(
        schema: &'s dyn SchemaProvider,
        table: WeightTable,
        config: ResolveConfig,
    ) -> Result<Self> {
        Self::with_registry(schema, table, config, &RuleRegistry::new())
    }

    pub fn with_registry(
        schema: &'s dyn SchemaProvider,
        mut table: WeightTable,
        config: ResolveConfig,
        registry: &RuleRegistry,
    ) -> Result<Self> {
        let config = config.validate(schema)?;

        for name in &config.range_settings {
            let (min, max) = config.range_bounds(
                name,
                table.option_i64(&format!("{name}_min")),
                table.option_i64(&format!("{name}_max")),
                schema,
            );
            table
                .weights
                .insert(name.clone(), uniform_range_weights(name, min, max)?);
        }

        for name in &config.excluded_settings {
            table.weights.shift_remove(name);
            table.multiselect.shift_remove(name);
        }

        for name in table.weights.keys() {
            schema.require(name)?;
        }
        for name in table.multiselect.keys() {
            let setting = schema.require(name)?;
            if setting.setting_type != SettingType::List || !setting.randomizable {
                return Err(RollError::InvalidConfig(format!(
                    "multiselect '{name}' must be a randomizable list setting"
                )));
            }
        }
        for option in config.literal_options.keys() {
            if let Some(value) = table.option(option) {
                literal_list(option, value)?;
            }
        }

        let scope = RuleScope::new(schema, &table.weights);
        let plan = registry.compile(&table.conditionals, &scope)?;
        info!(
            weights = table.weights.len(),
            multiselect = table.multiselect.len(),
            rules = plan.rule_ids().len(),
            "resolution engine ready"
        );

        Ok(Self {
            schema,
            table,
            config,
            plan,
        })
    }

    pub fn table(&self) -> &WeightTable {
        &self.table
    }

    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.plan.rule_ids()
    }

    /// Run one full attempt. Nothing survives between calls.
    pub fn resolve(&self, rng: &mut dyn RngCore) -> Result<Resolution> {
        let mut weights = self.table.weights.clone();
        let mut extra_items = self.table.start_with.clone();
        let mut settings = ResolvedSettings::new();

        for (name, options) in &weights {
            let option = weighted_choice(name, options, rng)?;
            settings.insert(name.clone(), SettingValue::from(option));
        }

        for (name, items) in resolve_multiselects(&self.table.multiselect, self.schema, rng)? {
            settings.insert(name, SettingValue::List(items));
        }

        {
            let mut ctx = RuleContext::new(&mut settings, &mut weights, &mut extra_items);
            self.plan.apply(&mut ctx, rng)?;
        }

        self.apply_literal_options(&mut settings)?;

        if self.table.option_bool("starting_items") == Some(true) {
            for (pool, items) in draw_starting_pools(self.schema, &settings, rng)? {
                settings.insert(pool, SettingValue::List(items));
            }
        }
        merge_extra_items(&mut settings, &extra_items);

        self.drop_random_companions(&mut settings);
        coerce_settings(&mut settings, self.schema)?;
        let pruned = prune(&mut settings, self.schema);
        debug!(pruned = pruned.len(), "pruned redundant settings");

        if let Some(message) = &self.config.user_message {
            settings.insert(
                "user_message".to_string(),
                SettingValue::Str(message.clone()),
            );
        }

        Ok(Resolution { settings, pruned })
    }

    fn apply_literal_options(&self, settings: &mut ResolvedSettings) -> Result<()> {
        for (option, target) in &self.config.literal_options {
            match self.table.option(option) {
                Some(value) => {
                    let items = literal_list(option, value)?;
                    settings.insert(target.clone(), SettingValue::List(items));
                }
                None if self.config.empty_when_missing.contains(target) => {
                    settings.insert(target.clone(), SettingValue::List(Vec::new()));
                }
                None => {}
            }
        }
        Ok(())
    }

    fn drop_random_companions(&self, settings: &mut ResolvedSettings) {
        for name in &self.config.random_companions {
            let companion = format!("{name}_random");
            let random = settings
                .get(&companion)
                .is_some_and(|value| value.matches_option("true"));
            if random && settings.shift_remove(name).is_some() {
                debug!(setting = %name, "dropped value of randomized companion");
            }
        }
    }
}

fn literal_list(option: &str, value: &Value) -> Result<Vec<String>> {
    let items = value.as_array().ok_or_else(|| {
        RollError::InvalidConfig(format!("option '{option}' must be a list of strings"))
    })?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                RollError::InvalidConfig(format!("option '{option}' must be a list of strings"))
            })
        })
        .collect()
}

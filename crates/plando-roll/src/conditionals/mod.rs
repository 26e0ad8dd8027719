//! Ordered conditional rules applied after the main draw.
//!
//! Rules are looked up by name in a closed [`RuleRegistry`]. The weights file
//! only selects and orders them; it never names code to run.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use plando_core::{ResolvedSettings, SchemaProvider, SettingInfo, SettingValue};
use plando_weights::ConditionalEntry;
use rand::RngCore;
use serde_json::Value;
use tracing::debug;

use crate::draw::weighted_choice;
use crate::errors::{Result, RollError};

mod exclusion;
mod pools;
mod single_winner;
mod slaved;
mod wincon;

/// Per-attempt key/value store shared by all rules of one attempt.
#[derive(Debug, Clone, Default)]
pub struct AttemptCache {
    entries: HashMap<String, Value>,
}

impl AttemptCache {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Claim `key` for `owner`; returns false when another owner holds it.
    pub fn claim(&mut self, key: &str, owner: &str) -> bool {
        match self.entries.get(key).and_then(Value::as_str) {
            Some(holder) => holder == owner,
            None => {
                self.entries
                    .insert(key.to_string(), Value::String(owner.to_string()));
                true
            }
        }
    }

    pub fn claimed_by(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }
}

/// Mutable state a rule may read and write during one attempt.
pub struct RuleContext<'a> {
    pub settings: &'a mut ResolvedSettings,
    /// Attempt-local copy of the categorical weights.
    pub weights: &'a mut IndexMap<String, IndexMap<String, f64>>,
    /// Extra starting items keyed by pool.
    pub extra_items: &'a mut IndexMap<String, Vec<String>>,
    pub cache: AttemptCache,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        settings: &'a mut ResolvedSettings,
        weights: &'a mut IndexMap<String, IndexMap<String, f64>>,
        extra_items: &'a mut IndexMap<String, Vec<String>>,
    ) -> Self {
        Self {
            settings,
            weights,
            extra_items,
            cache: AttemptCache::default(),
        }
    }

    /// Resolved value of a setting that must already be drawn.
    pub fn value(&self, setting: &str) -> Result<&SettingValue> {
        self.settings
            .get(setting)
            .ok_or_else(|| RollError::MissingSetting(setting.to_string()))
    }

    pub fn value_is(&self, setting: &str, options: &[&str]) -> Result<bool> {
        let value = self.value(setting)?;
        Ok(options.iter().any(|option| value.matches_option(option)))
    }

    pub fn set(&mut self, setting: &str, value: impl Into<SettingValue>) {
        self.settings.insert(setting.to_string(), value.into());
    }

    /// Remove options from the attempt copy of a weight entry.
    pub fn exclude_options(&mut self, setting: &str, options: &[&str]) -> Result<()> {
        let weights = self
            .weights
            .get_mut(setting)
            .ok_or_else(|| RollError::EmptyWeights(setting.to_string()))?;
        for option in options {
            weights.shift_remove(*option);
        }
        Ok(())
    }

    /// Draw `setting` again from its (possibly pruned) weight entry.
    pub fn redraw(&mut self, setting: &str, rng: &mut dyn RngCore) -> Result<()> {
        let weights = self
            .weights
            .get(setting)
            .ok_or_else(|| RollError::EmptyWeights(setting.to_string()))?;
        let option = weighted_choice(setting, weights, rng)?.to_string();
        self.set(setting, option);
        Ok(())
    }

    pub fn add_starting_item(&mut self, pool: &str, item: &str) {
        let items = self.extra_items.entry(pool.to_string()).or_default();
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
}

/// Schema and categorical weights that rule params are checked against.
#[derive(Clone, Copy)]
pub struct RuleScope<'a> {
    pub schema: &'a dyn SchemaProvider,
    pub weights: &'a IndexMap<String, IndexMap<String, f64>>,
}

impl<'a> RuleScope<'a> {
    pub fn new(
        schema: &'a dyn SchemaProvider,
        weights: &'a IndexMap<String, IndexMap<String, f64>>,
    ) -> Self {
        Self { schema, weights }
    }

    pub fn setting(&self, rule: &str, name: &str) -> Result<&'a SettingInfo> {
        self.schema
            .setting(name)
            .ok_or_else(|| RollError::invalid_params(rule, format!("unknown setting '{name}'")))
    }

    /// `value` must be a legal option of `setting`.
    pub fn option(&self, rule: &str, setting: &str, value: &str) -> Result<()> {
        if self.setting(rule, setting)?.accepts_option(value) {
            Ok(())
        } else {
            Err(RollError::invalid_params(
                rule,
                format!("'{value}' is not an option of '{setting}'"),
            ))
        }
    }

    pub fn options(&self, rule: &str, setting: &str, values: &[&str]) -> Result<()> {
        for value in values {
            self.option(rule, setting, value)?;
        }
        Ok(())
    }

    /// A redrawn setting needs its own categorical weight entry.
    pub fn categorical(&self, rule: &str, setting: &str, excluded: &[&str]) -> Result<()> {
        self.options(rule, setting, excluded)?;
        if self.weights.contains_key(setting) {
            Ok(())
        } else {
            Err(RollError::invalid_params(
                rule,
                format!("'{setting}' has no categorical weights to redraw from"),
            ))
        }
    }

    pub fn pool_item(&self, rule: &str, pool: &str, item: &str) -> Result<()> {
        let items = self.schema.starting_pool(pool).ok_or_else(|| {
            RollError::invalid_params(rule, format!("unknown starting pool '{pool}'"))
        })?;
        if items.iter().any(|candidate| candidate.name() == item) {
            Ok(())
        } else {
            Err(RollError::invalid_params(
                rule,
                format!("'{item}' is not in starting pool '{pool}'"),
            ))
        }
    }
}

/// A named conditional rule.
pub trait ConditionalRule: Send + Sync {
    fn id(&self) -> &'static str;

    /// Check positional params and the settings they name once, before any
    /// attempt runs.
    fn validate(&self, params: &[Value], scope: &RuleScope<'_>) -> Result<()>;

    fn apply(
        &self,
        ctx: &mut RuleContext<'_>,
        params: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<()>;
}

/// Closed set of rules available to weights files.
pub struct RuleRegistry {
    rules: HashMap<&'static str, Arc<dyn ConditionalRule>>,
}

impl RuleRegistry {
    /// Registry with every built-in rule.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        exclusion::register(&mut registry);
        slaved::register(&mut registry);
        single_winner::register(&mut registry);
        wincon::register(&mut registry);
        pools::register(&mut registry);
        registry
    }

    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    pub fn register_rule(&mut self, rule: Box<dyn ConditionalRule>) {
        self.rules.insert(rule.id(), Arc::from(rule));
    }

    pub fn get(&self, id: &str) -> Option<&dyn ConditionalRule> {
        self.rules.get(id).map(|rule| rule.as_ref())
    }

    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.rules.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Resolve a conditional list into the ordered rules that will run.
    pub fn compile(
        &self,
        conditionals: &IndexMap<String, ConditionalEntry>,
        scope: &RuleScope<'_>,
    ) -> Result<RulePlan> {
        let mut steps = Vec::new();
        for (name, entry) in conditionals {
            let rule = self
                .rules
                .get(name.as_str())
                .ok_or_else(|| RollError::UnknownRule(name.clone()))?;
            if !entry.enabled {
                continue;
            }
            rule.validate(&entry.params, scope)?;
            steps.push(RuleStep {
                rule: Arc::clone(rule),
                params: entry.params.clone(),
            });
        }
        Ok(RulePlan { steps })
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct RuleStep {
    rule: Arc<dyn ConditionalRule>,
    params: Vec<Value>,
}

/// Validated, ordered list of enabled rules.
#[derive(Clone)]
pub struct RulePlan {
    steps: Vec<RuleStep>,
}

impl RulePlan {
    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.rule.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Single forward pass over the enabled rules.
    pub fn apply(&self, ctx: &mut RuleContext<'_>, rng: &mut dyn RngCore) -> Result<()> {
        for step in &self.steps {
            debug!(rule = step.rule.id(), "applying conditional");
            step.rule.apply(ctx, &step.params, rng)?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{Fixture, catalog};
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;

    fn entries(list: &[(&str, bool, Vec<Value>)]) -> IndexMap<String, ConditionalEntry> {
        list.iter()
            .map(|(name, enabled, params)| {
                (name.to_string(), ConditionalEntry::new(*enabled, params.clone()))
            })
            .collect()
    }

    fn compile(list: &[(&str, bool, Vec<Value>)], fixture: &Fixture) -> Result<RulePlan> {
        let catalog = catalog();
        RuleRegistry::new().compile(&entries(list), &fixture.scope(&catalog))
    }

    fn force(trigger: &str, value: &str, target: &str, forced: &str) -> Vec<Value> {
        vec![json!(trigger), json!(value), json!(target), json!(forced)]
    }

    #[test]
    fn unknown_rules_are_rejected_even_when_disabled() {
        let err = compile(&[("shuffle_everything", false, vec![])], &Fixture::default())
            .err()
            .expect("unknown rule");
        assert!(matches!(err, RollError::UnknownRule(name) if name == "shuffle_everything"));
    }

    #[test]
    fn params_are_only_checked_for_enabled_rules() {
        let plan = compile(&[("dynamic_heart_wincon", false, vec![])], &Fixture::default())
            .expect("disabled rule");
        assert!(plan.is_empty());

        let err = compile(
            &[("dynamic_heart_wincon", true, vec![json!("often")])],
            &Fixture::default(),
        )
        .err()
        .expect("bad params");
        assert!(matches!(err, RollError::InvalidParams { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn misspelled_forced_option_fails_compile() {
        let err = compile(
            &[(
                "force_setting_when",
                true,
                force("bridge", "open", "shuffle_ganon_bosskey", "remve"),
            )],
            &Fixture::default(),
        )
        .err()
        .expect("bad option");
        assert!(
            matches!(&err, RollError::InvalidParams { rule, message }
                if rule == "force_setting_when" && message.contains("remve"))
        );
        assert!(!err.is_retryable());

        let err = compile(
            &[(
                "force_setting_when",
                true,
                force("bridge", "opne", "shuffle_ganon_bosskey", "remove"),
            )],
            &Fixture::default(),
        )
        .err()
        .expect("bad trigger value");
        assert!(matches!(err, RollError::InvalidParams { .. }));
    }

    #[test]
    fn unknown_settings_in_params_fail_compile() {
        let err = compile(
            &[(
                "force_setting_when",
                true,
                force("bridge", "open", "shuffle_beanz", "true"),
            )],
            &Fixture::default(),
        )
        .err()
        .expect("unknown target");
        assert!(
            matches!(&err, RollError::InvalidParams { message, .. } if message.contains("shuffle_beanz"))
        );

        let err = compile(
            &[(
                "guarantee_starting_item",
                true,
                force("bridge", "open", "starting_snacks", "song_of_time"),
            )],
            &Fixture::default(),
        )
        .err()
        .expect("unknown pool");
        assert!(matches!(err, RollError::InvalidParams { .. }));

        let err = compile(
            &[("single_winner", true, vec![json!("bridge:open"), json!("beans:false")])],
            &Fixture::default(),
        )
        .err()
        .expect("unknown pair setting");
        assert!(matches!(err, RollError::InvalidParams { .. }));
    }

    #[test]
    fn exclusion_target_needs_categorical_weights() {
        let params = vec![
            json!("shuffle_smallkeys"),
            json!("keysanity"),
            json!("starting_age"),
            json!("adult"),
        ];
        let err = compile(&[("exclude_option_when", true, params.clone())], &Fixture::default())
            .err()
            .expect("no weights");
        assert!(
            matches!(&err, RollError::InvalidParams { message, .. } if message.contains("shuffle_smallkeys"))
        );
        assert!(!err.is_retryable());

        let err = compile(&[("exclude_minimal_triforce_hunt", true, vec![])], &Fixture::default())
            .err()
            .expect("fixed target without weights");
        assert!(matches!(err, RollError::InvalidParams { .. }));

        let fixture = Fixture::default().weights(
            "shuffle_smallkeys",
            &[("keysanity", 50.0), ("dungeon", 50.0)],
        );
        compile(&[("exclude_option_when", true, params)], &fixture).expect("weighted target");
    }

    #[test]
    fn rules_run_in_declared_order() {
        let plan = compile(
            &[
                ("disable_lacs_condition_ifnot_ganonbosskey", true, vec![]),
                (
                    "force_setting_when",
                    true,
                    force("bridge", "open", "shuffle_ganon_bosskey", "remove"),
                ),
            ],
            &Fixture::default(),
        )
        .expect("plan");
        assert_eq!(
            plan.rule_ids(),
            vec!["disable_lacs_condition_ifnot_ganonbosskey", "force_setting_when"]
        );

        // The lacs rule runs first and still sees `on_lacs`.
        let mut fixture = Fixture::with_settings(&[
            ("bridge", "open"),
            ("shuffle_ganon_bosskey", "on_lacs"),
            ("lacs_condition", "lacs_stones"),
        ]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        plan.apply(&mut fixture.context(), &mut rng).expect("apply");
        assert_eq!(fixture.value("lacs_condition").as_deref(), Some("lacs_stones"));
        assert_eq!(fixture.value("shuffle_ganon_bosskey").as_deref(), Some("remove"));
    }

    #[test]
    fn missing_setting_fails_the_attempt() {
        let plan = compile(
            &[("disable_fortresskeys_independence", true, vec![])],
            &Fixture::default(),
        )
        .expect("plan");
        let mut fixture = Fixture::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = plan
            .apply(&mut fixture.context(), &mut rng)
            .expect_err("missing setting");
        assert!(err.is_retryable());
    }

    #[test]
    fn cache_claims_are_exclusive() {
        let mut cache = AttemptCache::default();
        assert!(cache.claim("wincon:bridge", "dynamic_skulltula_wincon"));
        assert!(cache.claim("wincon:bridge", "dynamic_skulltula_wincon"));
        assert!(!cache.claim("wincon:bridge", "dynamic_heart_wincon"));
        assert_eq!(cache.claimed_by("wincon:bridge"), Some("dynamic_skulltula_wincon"));
    }
}

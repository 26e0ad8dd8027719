use rand::RngCore;
use serde_json::Value;

use super::{ConditionalRule, RuleContext, RuleRegistry, RuleScope};
use crate::errors::Result;
use crate::params::{ParamKind, ParamSpec, validate_params};

const GUARANTEE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("trigger", ParamKind::String, true),
    ParamSpec::new("trigger_values", ParamKind::Strings, true),
    ParamSpec::new("pool", ParamKind::String, true),
    ParamSpec::new("item", ParamKind::String, true),
];

pub fn register(registry: &mut RuleRegistry) {
    registry.register_rule(Box::new(OhkoStartsWithNayrus));
    registry.register_rule(Box::new(GuaranteeStartingItem));
}

struct OhkoStartsWithNayrus;

impl ConditionalRule for OhkoStartsWithNayrus {
    fn id(&self) -> &'static str {
        "ohko_starts_with_nayrus"
    }

    fn validate(&self, params: &[Value], scope: &RuleScope<'_>) -> Result<()> {
        validate_params(params, &[], self.id())?;
        scope.option(self.id(), "damage_multiplier", "ohko")?;
        scope.pool_item(self.id(), "starting_inventory", "nayrus_love")
    }

    fn apply(
        &self,
        ctx: &mut RuleContext<'_>,
        _params: &[Value],
        _rng: &mut dyn RngCore,
    ) -> Result<()> {
        if ctx.value_is("damage_multiplier", &["ohko"])? {
            ctx.add_starting_item("starting_inventory", "nayrus_love");
        }
        Ok(())
    }
}

struct GuaranteeStartingItem;

impl ConditionalRule for GuaranteeStartingItem {
    fn id(&self) -> &'static str {
        "guarantee_starting_item"
    }

    fn validate(&self, params: &[Value], scope: &RuleScope<'_>) -> Result<()> {
        let params = validate_params(params, GUARANTEE_PARAMS, self.id())?;
        let trigger = params.get_str(0).unwrap_or_default();
        scope.options(self.id(), trigger, &params.get_strings(1))?;
        scope.pool_item(
            self.id(),
            params.get_str(2).unwrap_or_default(),
            params.get_str(3).unwrap_or_default(),
        )
    }

    fn apply(
        &self,
        ctx: &mut RuleContext<'_>,
        params: &[Value],
        _rng: &mut dyn RngCore,
    ) -> Result<()> {
        let params = validate_params(params, GUARANTEE_PARAMS, "guarantee_starting_item")?;
        let trigger = params.get_str(0).unwrap_or_default();
        if ctx.value_is(trigger, &params.get_strings(1))? {
            let pool = params.get_str(2).unwrap_or_default();
            let item = params.get_str(3).unwrap_or_default();
            ctx.add_starting_item(pool, item);
        }
        Ok(())
    }
}

use rand::RngCore;
use serde_json::Value;

use super::{ConditionalRule, RuleContext, RuleRegistry, RuleScope};
use crate::errors::Result;
use crate::params::{ParamKind, ParamSpec, validate_params};

const EXCLUDE_OPTION_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("target", ParamKind::String, true),
    ParamSpec::new("excluded", ParamKind::Strings, true),
    ParamSpec::new("trigger", ParamKind::String, true),
    ParamSpec::new("trigger_values", ParamKind::Strings, true),
];

pub fn register(registry: &mut RuleRegistry) {
    registry.register_rule(Box::new(FixedExclusion {
        id: "exclude_minimal_triforce_hunt",
        target: "item_pool_value",
        excluded: &["minimal"],
        trigger: "triforce_hunt",
        trigger_values: &["true"],
    }));
    registry.register_rule(Box::new(FixedExclusion {
        id: "exclude_ice_trap_misery",
        target: "junk_ice_traps",
        excluded: &["mayhem", "onslaught"],
        trigger: "damage_multiplier",
        trigger_values: &["quadruple", "ohko"],
    }));
    registry.register_rule(Box::new(ExcludeOptionWhen));
}

/// Drop `excluded` from the target's weights when the trigger holds, then
/// redraw the target. The redraw happens either way.
fn exclude_then_redraw(
    ctx: &mut RuleContext<'_>,
    target: &str,
    excluded: &[&str],
    trigger: &str,
    trigger_values: &[&str],
    rng: &mut dyn RngCore,
) -> Result<()> {
    if ctx.value_is(trigger, trigger_values)? {
        ctx.exclude_options(target, excluded)?;
    }
    ctx.redraw(target, rng)
}

fn check_exclusion(
    scope: &RuleScope<'_>,
    rule: &str,
    target: &str,
    excluded: &[&str],
    trigger: &str,
    trigger_values: &[&str],
) -> Result<()> {
    scope.categorical(rule, target, excluded)?;
    scope.options(rule, trigger, trigger_values)
}

struct FixedExclusion {
    id: &'static str,
    target: &'static str,
    excluded: &'static [&'static str],
    trigger: &'static str,
    trigger_values: &'static [&'static str],
}

impl ConditionalRule for FixedExclusion {
    fn id(&self) -> &'static str {
        self.id
    }

    fn validate(&self, params: &[Value], scope: &RuleScope<'_>) -> Result<()> {
        validate_params(params, &[], self.id)?;
        check_exclusion(
            scope,
            self.id,
            self.target,
            self.excluded,
            self.trigger,
            self.trigger_values,
        )
    }

    fn apply(
        &self,
        ctx: &mut RuleContext<'_>,
        _params: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        exclude_then_redraw(
            ctx,
            self.target,
            self.excluded,
            self.trigger,
            self.trigger_values,
            rng,
        )
    }
}

struct ExcludeOptionWhen;

impl ConditionalRule for ExcludeOptionWhen {
    fn id(&self) -> &'static str {
        "exclude_option_when"
    }

    fn validate(&self, params: &[Value], scope: &RuleScope<'_>) -> Result<()> {
        let params = validate_params(params, EXCLUDE_OPTION_PARAMS, self.id())?;
        check_exclusion(
            scope,
            self.id(),
            params.get_str(0).unwrap_or_default(),
            &params.get_strings(1),
            params.get_str(2).unwrap_or_default(),
            &params.get_strings(3),
        )
    }

    fn apply(
        &self,
        ctx: &mut RuleContext<'_>,
        params: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        let params = validate_params(params, EXCLUDE_OPTION_PARAMS, "exclude_option_when")?;
        let target = params.get_str(0).unwrap_or_default();
        let trigger = params.get_str(2).unwrap_or_default();
        exclude_then_redraw(
            ctx,
            target,
            &params.get_strings(1),
            trigger,
            &params.get_strings(3),
            rng,
        )
    }
}

use rand::RngCore;
use serde_json::Value;

use super::{ConditionalRule, RuleContext, RuleRegistry, RuleScope};
use crate::errors::Result;
use crate::params::{ParamKind, ParamSpec, validate_params};

const FORCE_SETTING_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("trigger", ParamKind::String, true),
    ParamSpec::new("trigger_values", ParamKind::Strings, true),
    ParamSpec::new("target", ParamKind::String, true),
    ParamSpec::new("forced", ParamKind::String, true),
];

/// Small key modes that keep fortress keys vanilla.
const LOCAL_SMALLKEY_MODES: &[&str] = &["remove", "vanilla", "dungeon"];

pub fn register(registry: &mut RuleRegistry) {
    registry.register_rule(Box::new(FortressKeysFollowSmallKeys));
    registry.register_rule(Box::new(LacsFollowsBossKey));
    registry.register_rule(Box::new(ForceSettingWhen));
}

struct FortressKeysFollowSmallKeys;

impl ConditionalRule for FortressKeysFollowSmallKeys {
    fn id(&self) -> &'static str {
        "disable_fortresskeys_independence"
    }

    fn validate(&self, params: &[Value], scope: &RuleScope<'_>) -> Result<()> {
        validate_params(params, &[], self.id())?;
        scope.setting(self.id(), "shuffle_smallkeys")?;
        scope.option(self.id(), "shuffle_fortresskeys", "vanilla")
    }

    fn apply(
        &self,
        ctx: &mut RuleContext<'_>,
        _params: &[Value],
        _rng: &mut dyn RngCore,
    ) -> Result<()> {
        let smallkeys = ctx.value("shuffle_smallkeys")?.clone();
        if LOCAL_SMALLKEY_MODES
            .iter()
            .any(|mode| smallkeys.matches_option(mode))
        {
            ctx.set("shuffle_fortresskeys", "vanilla");
        } else {
            ctx.set("shuffle_fortresskeys", smallkeys);
        }
        Ok(())
    }
}

struct LacsFollowsBossKey;

impl ConditionalRule for LacsFollowsBossKey {
    fn id(&self) -> &'static str {
        "disable_lacs_condition_ifnot_ganonbosskey"
    }

    fn validate(&self, params: &[Value], scope: &RuleScope<'_>) -> Result<()> {
        validate_params(params, &[], self.id())?;
        scope.option(self.id(), "shuffle_ganon_bosskey", "on_lacs")?;
        scope.option(self.id(), "lacs_condition", "lacs_vanilla")
    }

    fn apply(
        &self,
        ctx: &mut RuleContext<'_>,
        _params: &[Value],
        _rng: &mut dyn RngCore,
    ) -> Result<()> {
        if !ctx.value_is("shuffle_ganon_bosskey", &["on_lacs"])? {
            ctx.set("lacs_condition", "lacs_vanilla");
        }
        Ok(())
    }
}

struct ForceSettingWhen;

impl ConditionalRule for ForceSettingWhen {
    fn id(&self) -> &'static str {
        "force_setting_when"
    }

    fn validate(&self, params: &[Value], scope: &RuleScope<'_>) -> Result<()> {
        let params = validate_params(params, FORCE_SETTING_PARAMS, self.id())?;
        let trigger = params.get_str(0).unwrap_or_default();
        scope.options(self.id(), trigger, &params.get_strings(1))?;
        let target = params.get_str(2).unwrap_or_default();
        scope.option(self.id(), target, params.get_str(3).unwrap_or_default())
    }

    fn apply(
        &self,
        ctx: &mut RuleContext<'_>,
        params: &[Value],
        _rng: &mut dyn RngCore,
    ) -> Result<()> {
        let params = validate_params(params, FORCE_SETTING_PARAMS, "force_setting_when")?;
        let trigger = params.get_str(0).unwrap_or_default();
        if ctx.value_is(trigger, &params.get_strings(1))? {
            let target = params.get_str(2).unwrap_or_default();
            let forced = params.get_str(3).unwrap_or_default();
            ctx.set(target, forced);
        }
        Ok(())
    }
}

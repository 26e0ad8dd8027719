use rand::RngCore;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use serde_json::{Value, json};
use tracing::debug;

use super::{ConditionalRule, RuleContext, RuleRegistry, RuleScope};
use crate::draw::roll_percentage;
use crate::errors::{Result, RollError};
use crate::params::{ParamKind, ParamSpec, validate_params};

const WINCON_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("chance", ParamKind::Percentage, true),
    ParamSpec::new("split", ParamKind::Split, true),
];

/// Settings a dynamic win condition may overwrite, in split order.
pub const WINCON_TARGETS: &[&str] = &["bridge", "shuffle_ganon_bosskey"];

pub fn register(registry: &mut RuleRegistry) {
    registry.register_rule(Box::new(DynamicWincon {
        id: "dynamic_skulltula_wincon",
        special: "tokens",
    }));
    registry.register_rule(Box::new(DynamicWincon {
        id: "dynamic_heart_wincon",
        special: "hearts",
    }));
}

/// Which settings a fired win condition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WinconTarget {
    Bridge,
    BossKey,
    Both,
}

impl WinconTarget {
    const ALL: [WinconTarget; 3] = [WinconTarget::Bridge, WinconTarget::BossKey, WinconTarget::Both];

    fn settings(self) -> &'static [&'static str] {
        match self {
            WinconTarget::Bridge => &WINCON_TARGETS[..1],
            WinconTarget::BossKey => &WINCON_TARGETS[1..],
            WinconTarget::Both => WINCON_TARGETS,
        }
    }

    fn label(self) -> &'static str {
        match self {
            WinconTarget::Bridge => "bridge",
            WinconTarget::BossKey => "gbk",
            WinconTarget::Both => "both",
        }
    }
}

/// Cache key under which a target setting is claimed.
pub fn claim_key(setting: &str) -> String {
    format!("wincon:{setting}")
}

/// Re-weighted side channel: with `chance` percent, overwrite the bridge
/// and/or boss key with a shared special condition.
///
/// The first rule to fire claims its targets for the rest of the attempt.
struct DynamicWincon {
    id: &'static str,
    special: &'static str,
}

impl ConditionalRule for DynamicWincon {
    fn id(&self) -> &'static str {
        self.id
    }

    fn validate(&self, params: &[Value], scope: &RuleScope<'_>) -> Result<()> {
        validate_params(params, WINCON_PARAMS, self.id)?;
        for setting in WINCON_TARGETS {
            scope.option(self.id, setting, self.special)?;
        }
        Ok(())
    }

    fn apply(
        &self,
        ctx: &mut RuleContext<'_>,
        params: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        let params = validate_params(params, WINCON_PARAMS, self.id)?;
        let chance = params.get_f64(0).unwrap_or_default();
        let split = params.get_split(1).unwrap_or_default();

        if !roll_percentage(chance, rng) {
            return Ok(());
        }

        let dist = WeightedIndex::new(&split).map_err(|err| RollError::Draw {
            setting: self.id.to_string(),
            message: err.to_string(),
        })?;
        let target = WinconTarget::ALL[dist.sample(rng)];
        ctx.cache
            .insert(format!("{}:target", self.id), json!(target.label()));

        for setting in target.settings() {
            if !ctx.cache.claim(&claim_key(setting), self.id) {
                debug!(rule = self.id, setting = *setting, "win condition already claimed");
                continue;
            }
            ctx.set(setting, self.special);
        }
        Ok(())
    }
}

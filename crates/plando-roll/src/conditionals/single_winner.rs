use rand::RngCore;
use rand::seq::IndexedRandom;
use serde_json::Value;
use tracing::debug;

use super::{ConditionalRule, RuleContext, RuleRegistry, RuleScope};
use crate::errors::Result;
use crate::params::{Pair, validate_pairs};

/// Entrance shuffles that may not be combined, with their off value.
const ENTRANCE_PAIRS: &[(&str, &str)] = &[
    ("shuffle_interior_entrances", "off"),
    ("shuffle_grotto_entrances", "false"),
    ("shuffle_dungeon_entrances", "false"),
    ("shuffle_overworld_entrances", "false"),
];

pub fn register(registry: &mut RuleRegistry) {
    registry.register_rule(Box::new(SingleWinner {
        id: "restrict_one_entrance_randomizer",
        defaults: ENTRANCE_PAIRS,
        min_pairs: 0,
    }));
    registry.register_rule(Box::new(SingleWinner {
        id: "single_winner",
        defaults: &[],
        min_pairs: 2,
    }));
}

/// Keep at most one setting of the group away from its off value.
///
/// Returns the survivor when the group had to be cut down.
pub fn enforce_single_winner(
    ctx: &mut RuleContext<'_>,
    pairs: &[Pair],
    rng: &mut dyn RngCore,
) -> Result<Option<String>> {
    let mut enabled = Vec::new();
    for pair in pairs {
        if !ctx.value(&pair.setting)?.matches_option(&pair.value) {
            enabled.push(pair.setting.as_str());
        }
    }
    if enabled.len() < 2 {
        return Ok(None);
    }

    let Some(survivor) = enabled.choose(rng).map(|setting| setting.to_string()) else {
        return Ok(None);
    };
    for pair in pairs {
        if pair.setting != survivor {
            debug!(setting = %pair.setting, survivor = %survivor, "turning setting off");
            ctx.set(&pair.setting, pair.value.as_str());
        }
    }
    Ok(Some(survivor))
}

struct SingleWinner {
    id: &'static str,
    defaults: &'static [(&'static str, &'static str)],
    min_pairs: usize,
}

impl SingleWinner {
    fn pairs(&self, params: &[Value]) -> Result<Vec<Pair>> {
        if params.is_empty() && !self.defaults.is_empty() {
            return Ok(self
                .defaults
                .iter()
                .map(|(setting, value)| Pair {
                    setting: setting.to_string(),
                    value: value.to_string(),
                })
                .collect());
        }
        validate_pairs(params, self.min_pairs.max(2), self.id)
    }
}

impl ConditionalRule for SingleWinner {
    fn id(&self) -> &'static str {
        self.id
    }

    fn validate(&self, params: &[Value], scope: &RuleScope<'_>) -> Result<()> {
        for pair in self.pairs(params)? {
            scope.option(self.id, &pair.setting, &pair.value)?;
        }
        Ok(())
    }

    fn apply(
        &self,
        ctx: &mut RuleContext<'_>,
        params: &[Value],
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        let pairs = self.pairs(params)?;
        enforce_single_winner(ctx, &pairs, rng)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{Fixture, catalog};
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;

    fn entrance_rule() -> SingleWinner {
        SingleWinner {
            id: "restrict_one_entrance_randomizer",
            defaults: ENTRANCE_PAIRS,
            min_pairs: 0,
        }
    }

    fn enabled_count(fixture: &Fixture) -> usize {
        ENTRANCE_PAIRS
            .iter()
            .filter(|(setting, off)| fixture.value(setting).as_deref() != Some(*off))
            .count()
    }

    fn fixture_with(on: [bool; 4]) -> Fixture {
        let values = [
            if on[0] { "all" } else { "off" },
            if on[1] { "true" } else { "false" },
            if on[2] { "true" } else { "false" },
            if on[3] { "true" } else { "false" },
        ];
        let pairs: Vec<(&str, &str)> = ENTRANCE_PAIRS
            .iter()
            .zip(values)
            .map(|((setting, _), value)| (*setting, value))
            .collect();
        Fixture::with_settings(&pairs)
    }

    #[test]
    fn at_most_one_entrance_shuffle_survives() {
        let rule = entrance_rule();
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        for _ in 0..300 {
            let on = [
                rng.random_bool(0.5),
                rng.random_bool(0.5),
                rng.random_bool(0.5),
                rng.random_bool(0.5),
            ];
            let before = on.iter().filter(|flag| **flag).count();
            let mut fixture = fixture_with(on);
            rule.apply(&mut fixture.context(), &[], &mut rng)
                .expect("apply");
            let after = enabled_count(&fixture);
            assert!(after <= 1);
            assert_eq!(after, before.min(1));
        }
    }

    #[test]
    fn all_off_and_all_on_boundaries() {
        let rule = entrance_rule();
        let mut rng = ChaCha8Rng::seed_from_u64(8);

        let mut all_off = fixture_with([false; 4]);
        rule.apply(&mut all_off.context(), &[], &mut rng)
            .expect("apply");
        assert_eq!(enabled_count(&all_off), 0);

        let mut survivors = std::collections::BTreeSet::new();
        for _ in 0..200 {
            let mut all_on = fixture_with([true; 4]);
            rule.apply(&mut all_on.context(), &[], &mut rng)
                .expect("apply");
            assert_eq!(enabled_count(&all_on), 1);
            let survivor = ENTRANCE_PAIRS
                .iter()
                .find(|(setting, off)| all_on.value(setting).as_deref() != Some(*off))
                .map(|(setting, _)| *setting)
                .expect("one survivor");
            survivors.insert(survivor);
        }
        assert_eq!(survivors.len(), ENTRANCE_PAIRS.len());
    }

    #[test]
    fn generic_rule_needs_two_pairs() {
        let rule = SingleWinner {
            id: "single_winner",
            defaults: &[],
            min_pairs: 2,
        };
        let catalog = catalog();
        let empty = Fixture::default();
        let scope = empty.scope(&catalog);
        assert!(rule.validate(&[], &scope).is_err());
        assert!(rule.validate(&[json!("bridge:open")], &scope).is_err());
        assert!(
            rule.validate(&[json!("bridge:opn"), json!("triforce_hunt:false")], &scope)
                .is_err()
        );
        rule.validate(&[json!("bridge:open"), json!("triforce_hunt:false")], &scope)
            .expect("two pairs");

        let mut fixture = Fixture::with_settings(&[
            ("bridge", "dungeons"),
            ("triforce_hunt", "true"),
        ]);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        rule.apply(
            &mut fixture.context(),
            &[json!("bridge:open"), json!("triforce_hunt:false")],
            &mut rng,
        )
        .expect("apply");
        let bridge_open = fixture.value("bridge").as_deref() == Some("open");
        let hunt_off = fixture.value("triforce_hunt").as_deref() == Some("false");
        assert!(bridge_open ^ hunt_off);
    }
}

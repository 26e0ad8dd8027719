//! Random draw primitives.
//!
//! Every function takes the attempt RNG as `&mut dyn RngCore` so callers can
//! pass a seeded `ChaCha8Rng` in tests and the process RNG in production.

use indexmap::IndexMap;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::{Rng, RngCore};

use crate::errors::{Result, RollError};

/// Weighted categorical draw over `option -> weight`.
pub fn weighted_choice<'a>(
    setting: &str,
    options: &'a IndexMap<String, f64>,
    rng: &mut dyn RngCore,
) -> Result<&'a str> {
    let total: f64 = options
        .values()
        .filter(|weight| weight.is_finite() && **weight > 0.0)
        .sum();
    if total <= 0.0 {
        return Err(RollError::EmptyWeights(setting.to_string()));
    }

    let dist = WeightedIndex::new(options.values().copied()).map_err(|err| RollError::Draw {
        setting: setting.to_string(),
        message: err.to_string(),
    })?;
    let idx = dist.sample(rng);
    options
        .get_index(idx)
        .map(|(option, _)| option.as_str())
        .ok_or_else(|| RollError::Draw {
            setting: setting.to_string(),
            message: format!("index {idx} out of range"),
        })
}

/// Inclusion probability of slot `slot` in a geometric countdown.
pub fn geometric_inclusion_probability(slot: usize) -> f64 {
    let pct = 50.0 / 2f64.powi(slot.min(i32::MAX as usize) as i32);
    pct.min(100.0) / 100.0
}

/// Include each slot independently with halving probability.
pub fn geometric_countdown<T: Clone>(items: &[T], rng: &mut dyn RngCore) -> Vec<T> {
    items
        .iter()
        .enumerate()
        .filter(|(slot, _)| rng.random_bool(geometric_inclusion_probability(*slot)))
        .map(|(_, item)| item.clone())
        .collect()
}

/// Weights `50 / 2^k` for counts `k` in `0..=n`.
pub fn geometric_weights(n: usize) -> Vec<f64> {
    (0..=n)
        .map(|count| 50.0 / 2f64.powi(count.min(i32::MAX as usize) as i32))
        .collect()
}

/// Draw a count in `0..=n` with geometric weights.
pub fn geometric_count(n: usize, rng: &mut dyn RngCore) -> Result<usize> {
    let dist = WeightedIndex::new(geometric_weights(n)).map_err(|err| RollError::Draw {
        setting: "geometric_count".to_string(),
        message: err.to_string(),
    })?;
    Ok(dist.sample(rng))
}

/// Sample `count` distinct items, returned in their canonical order.
pub fn sample_without_replacement<T: Clone>(
    items: &[T],
    count: usize,
    rng: &mut dyn RngCore,
) -> Vec<T> {
    let count = count.min(items.len());
    let mut picked = rand::seq::index::sample(rng, items.len(), count).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|idx| items[idx].clone()).collect()
}

/// Geometric count followed by a uniform sample of that many items.
pub fn geometric_sample<T: Clone>(items: &[T], rng: &mut dyn RngCore) -> Result<Vec<T>> {
    let count = geometric_count(items.len(), rng)?;
    Ok(sample_without_replacement(items, count, rng))
}

/// Uniform weight table over `[min, max]`.
pub fn uniform_range_weights(setting: &str, min: i64, max: i64) -> Result<IndexMap<String, f64>> {
    if min > max {
        return Err(RollError::InvalidConfig(format!(
            "{setting}: minimum {min} is greater than maximum {max}"
        )));
    }
    let weight = 100.0 / (max - min + 1) as f64;
    Ok((min..=max)
        .map(|value| (value.to_string(), weight))
        .collect())
}

/// Percentage roll: true with probability `pct / 100`.
pub fn roll_percentage(pct: f64, rng: &mut dyn RngCore) -> bool {
    rng.random::<f64>() * 100.0 < pct
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn table(entries: &[(&str, f64)]) -> IndexMap<String, f64> {
        entries
            .iter()
            .map(|(option, weight)| (option.to_string(), *weight))
            .collect()
    }

    #[test]
    fn draws_stay_inside_the_option_set() {
        let options = table(&[("open", 10.0), ("vanilla", 0.0), ("dungeons", 5.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let option = weighted_choice("bridge", &options, &mut rng).expect("draw");
            assert!(option == "open" || option == "dungeons");
        }
    }

    #[test]
    fn same_seed_reproduces_draws() {
        let options = table(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let run = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..50)
                .map(|_| {
                    weighted_choice("s", &options, &mut rng)
                        .expect("draw")
                        .to_string()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn empty_or_zero_weights_are_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = weighted_choice("junk_ice_traps", &table(&[("off", 0.0)]), &mut rng)
            .expect_err("zero weights");
        assert!(matches!(err, RollError::EmptyWeights(name) if name == "junk_ice_traps"));
        assert!(weighted_choice("x", &IndexMap::new(), &mut rng).is_err());
    }

    #[test]
    fn geometric_slots_halve() {
        assert_eq!(geometric_inclusion_probability(0), 0.5);
        assert_eq!(geometric_inclusion_probability(1), 0.25);
        assert_eq!(geometric_inclusion_probability(3), 0.0625);
        assert_eq!(geometric_weights(2), vec![50.0, 25.0, 12.5]);
    }

    #[test]
    fn geometric_countdown_frequencies_follow_slots() {
        let items: Vec<usize> = (0..4).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let trials = 40_000;
        let mut hits = [0usize; 4];
        for _ in 0..trials {
            for slot in geometric_countdown(&items, &mut rng) {
                hits[slot] += 1;
            }
        }
        for (slot, count) in hits.iter().enumerate() {
            let observed = *count as f64 / trials as f64;
            let expected = geometric_inclusion_probability(slot);
            assert!(
                (observed - expected).abs() < 0.01,
                "slot {slot}: observed {observed}, expected {expected}"
            );
        }
    }

    #[test]
    fn samples_are_distinct_and_bounded() {
        let items = ["a", "b", "c", "d"];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for count in 0..=6 {
            let sample = sample_without_replacement(&items, count, &mut rng);
            assert_eq!(sample.len(), count.min(items.len()));
            let mut unique = sample.clone();
            unique.dedup();
            assert_eq!(unique, sample);
        }
    }

    #[test]
    fn uniform_range_covers_bounds() {
        let weights = uniform_range_weights("bridge_tokens", 20, 50).expect("range");
        assert_eq!(weights.len(), 31);
        assert_eq!(weights.get_index(0).map(|(k, _)| k.as_str()), Some("20"));
        assert!(uniform_range_weights("bridge_tokens", 5, 4).is_err());
    }
}

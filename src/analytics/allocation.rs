//! Stake allocation across ranked positive-Kelly opportunities.
//!
//! Pass 1 sizes every entry from its Kelly fraction. When the fractions sum
//! above 1 the bankroll is split proportionally; otherwise each entry gets
//! its literal `kelly × bankroll` and the rest of the bankroll stays unspent.
//! Anything above the per-item cap becomes the remainder.
//!
//! Pass 2 water-fills that remainder over the entries still below the cap,
//! proportionally to Kelly, until it drops under epsilon or nobody has room
//! left. Rounding to cents happens once, after the last round.

use serde::Serialize;
use tracing::debug;

use super::metrics::round_to;

/// Hard ceiling on a single stake.
pub const DEFAULT_PER_ITEM_CAP: f64 = 5000.0;

/// Remainder below this is considered spent.
pub const DEFAULT_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy)]
pub struct AllocationConfig {
    pub per_item_cap: f64,
    pub epsilon: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            per_item_cap: DEFAULT_PER_ITEM_CAP,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

/// Anything that carries a Kelly weight can be allocated against.
pub trait KellyWeighted {
    fn kelly(&self) -> f64;
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationEntry<T> {
    pub entry: T,
    pub allocated_stake: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationPlan<T> {
    pub entries: Vec<AllocationEntry<T>>,
    pub bankroll: f64,
    pub allocated: f64,
    pub unallocated: f64,
    /// Number of water-filling rounds that ran.
    pub redistribution_rounds: usize,
}

/// Raw stake split before any rounding.
#[derive(Debug, Clone, PartialEq)]
pub struct StakeSplit {
    pub stakes: Vec<f64>,
    pub rounds: usize,
}

/// Allocate `bankroll` over ranked entries.
pub fn allocate<T: KellyWeighted>(
    ranked: Vec<T>,
    bankroll: f64,
    config: &AllocationConfig,
) -> AllocationPlan<T> {
    let kellies: Vec<f64> = ranked.iter().map(KellyWeighted::kelly).collect();
    let split = split_stakes(&kellies, bankroll, config);
    let stakes = round_stakes(&split.stakes, bankroll, config.per_item_cap);

    let allocated = round_to(stakes.iter().sum(), 2);
    let unallocated = round_to((bankroll.max(0.0) - allocated).max(0.0), 2);

    debug!(
        entries = stakes.len(),
        bankroll,
        allocated,
        unallocated,
        rounds = split.rounds,
        "Stake allocation complete"
    );

    AllocationPlan {
        entries: ranked
            .into_iter()
            .zip(stakes)
            .map(|(entry, allocated_stake)| AllocationEntry {
                entry,
                allocated_stake,
            })
            .collect(),
        bankroll,
        allocated,
        unallocated,
        redistribution_rounds: split.rounds,
    }
}

/// Two-pass split of `bankroll` by Kelly weight, unrounded.
pub fn split_stakes(kellies: &[f64], bankroll: f64, config: &AllocationConfig) -> StakeSplit {
    let n = kellies.len();
    let cap = config.per_item_cap;
    let eps = config.epsilon;
    let weights: Vec<f64> = kellies
        .iter()
        .map(|k| if k.is_finite() && *k > 0.0 { *k } else { 0.0 })
        .collect();

    let mut stakes = vec![0.0; n];
    if n == 0 || !(bankroll > 0.0) {
        return StakeSplit { stakes, rounds: 0 };
    }

    let total: f64 = weights.iter().sum();
    let mut remainder = 0.0;
    for (stake, w) in stakes.iter_mut().zip(&weights) {
        let raw = if total > 1.0 {
            w / total * bankroll
        } else {
            w * bankroll
        };
        *stake = raw.min(cap);
        remainder += (raw - cap).max(0.0);
    }

    // Every round either caps at least one entry or spends the remainder,
    // so n + 1 rounds is a hard ceiling.
    let mut rounds = 0;
    while remainder > eps && rounds <= n {
        let eligible: Vec<usize> = (0..n)
            .filter(|&i| weights[i] > 0.0 && cap - stakes[i] > eps)
            .collect();
        let eligible_weight: f64 = eligible.iter().map(|&i| weights[i]).sum();
        if eligible.is_empty() || eligible_weight <= 0.0 {
            break;
        }

        rounds += 1;
        let pool = remainder;
        for i in eligible {
            let share = pool * weights[i] / eligible_weight;
            let added = share.min(cap - stakes[i]);
            stakes[i] += added;
            remainder -= added;
        }
        remainder = remainder.max(0.0);
    }

    StakeSplit { stakes, rounds }
}

/// Round to cents while keeping the cap and bankroll bounds intact.
fn round_stakes(stakes: &[f64], bankroll: f64, cap: f64) -> Vec<f64> {
    let cap_cents = (cap * 100.0).floor() / 100.0;
    let mut rounded: Vec<f64> = stakes
        .iter()
        .map(|s| round_to(*s, 2).min(cap_cents).max(0.0))
        .collect();

    // Half-cent rounding on many entries can overshoot the bankroll by a
    // few cents; take them back from the largest stakes.
    let limit = bankroll.max(0.0) + 1e-9;
    while rounded.iter().sum::<f64>() > limit {
        let Some((idx, _)) = rounded
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        else {
            break;
        };
        if rounded[idx] <= 0.0 {
            break;
        }
        rounded[idx] = round_to((rounded[idx] - 0.01).max(0.0), 2);
    }
    rounded
}

impl KellyWeighted for f64 {
    fn kelly(&self) -> f64 {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;

    fn cfg(cap: f64) -> AllocationConfig {
        AllocationConfig {
            per_item_cap: cap,
            ..AllocationConfig::default()
        }
    }

    #[test]
    fn test_linear_regime_leaves_bankroll_unspent() {
        let plan = allocate(vec![0.3, 0.1], 10_000.0, &cfg(5000.0));
        assert_relative_eq!(plan.entries[0].allocated_stake, 3000.0, epsilon = 1e-9);
        assert_relative_eq!(plan.entries[1].allocated_stake, 1000.0, epsilon = 1e-9);
        assert_eq!(plan.redistribution_rounds, 0);
        assert_relative_eq!(plan.unallocated, 6000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_all_capped_leaves_remainder() {
        let plan = allocate(vec![0.5, 0.5, 0.5], 3000.0, &cfg(900.0));
        for e in &plan.entries {
            assert_relative_eq!(e.allocated_stake, 900.0, epsilon = 1e-9);
        }
        assert_eq!(plan.redistribution_rounds, 0);
        assert_relative_eq!(plan.unallocated, 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_capped_excess_flows_to_uncapped() {
        // Linear regime: 6000 → 5000 cap, 1000 excess split 3:1
        let plan = allocate(vec![0.6, 0.3, 0.1], 10_000.0, &cfg(5000.0));
        let stakes: Vec<f64> = plan.entries.iter().map(|e| e.allocated_stake).collect();
        assert_relative_eq!(stakes[0], 5000.0, epsilon = 1e-9);
        assert_relative_eq!(stakes[1], 3750.0, epsilon = 1e-9);
        assert_relative_eq!(stakes[2], 1250.0, epsilon = 1e-9);
        assert_eq!(plan.redistribution_rounds, 1);
        assert_relative_eq!(plan.unallocated, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cascading_caps() {
        // Proportional regime (S = 2): 4000/4000/2000 against a 3000 cap.
        // Round 1 fills the third entry to the cap, 1000 is left stranded.
        let plan = allocate(vec![0.8, 0.8, 0.4], 10_000.0, &cfg(3000.0));
        for e in &plan.entries {
            assert_relative_eq!(e.allocated_stake, 3000.0, epsilon = 1e-9);
        }
        assert_eq!(plan.redistribution_rounds, 1);
        assert_relative_eq!(plan.unallocated, 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_proportional_regime_spends_bankroll() {
        let plan = allocate(vec![0.9, 0.6], 1000.0, &cfg(5000.0));
        assert_relative_eq!(plan.entries[0].allocated_stake, 600.0, epsilon = 1e-9);
        assert_relative_eq!(plan.entries[1].allocated_stake, 400.0, epsilon = 1e-9);
        assert_relative_eq!(plan.allocated, 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_and_zero_bankroll() {
        let plan = allocate(Vec::<f64>::new(), 1000.0, &cfg(5000.0));
        assert!(plan.entries.is_empty());
        assert_relative_eq!(plan.unallocated, 1000.0, epsilon = 1e-9);

        let plan = allocate(vec![0.4], 0.0, &cfg(5000.0));
        assert_eq!(plan.entries[0].allocated_stake, 0.0);
    }

    #[test]
    fn test_non_positive_weights_get_nothing() {
        let split = split_stakes(&[0.5, 0.0, -0.2, f64::NAN], 1000.0, &cfg(5000.0));
        assert_relative_eq!(split.stakes[0], 500.0, epsilon = 1e-9);
        assert_eq!(&split.stakes[1..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_bounds_hold_for_random_inputs() {
        let mut rng = rand::thread_rng();
        for _ in 0..300 {
            let n = rng.gen_range(1..12);
            let kellies: Vec<f64> = (0..n).map(|_| rng.gen_range(0.001..0.9)).collect();
            let bankroll = rng.gen_range(10.0..50_000.0);
            let cap = rng.gen_range(5.0..8000.0);
            let plan = allocate(kellies, bankroll, &cfg(cap));
            let total: f64 = plan.entries.iter().map(|e| e.allocated_stake).sum();
            assert!(total <= bankroll + 1e-6, "total {total} > bankroll {bankroll}");
            assert!(plan.redistribution_rounds <= n + 1);
            for e in &plan.entries {
                assert!(e.allocated_stake <= cap + 1e-9);
                assert!(e.allocated_stake >= 0.0);
            }
        }
    }
}

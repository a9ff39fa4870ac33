//! Metrics engine: turns a reference odds pair plus optional platform odds
//! into per-side fair probability, rake, expected profit, variance and Kelly.
//!
//! Reference odds are decimal *total* odds (stake included). Platform odds
//! are *net* odds (stake excluded), so their total is `net + 1`.
//!
//! The engine is pure. A missing input only blanks the fields that depend on
//! it; nothing here returns an error.

use serde::{Deserialize, Serialize};

use super::kelly::{expected_profit, kelly_fraction, profit_variance};
use super::odds::{na, OddsQuote};

/// Decimal places kept on rake to absorb floating-point noise.
pub const RAKE_DECIMALS: i32 = 5;

/// Computed figures for one side of one match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    #[serde(with = "na")]
    pub probability: Option<f64>,
    pub platform_odds: OddsQuote,
    /// Market-level; identical on both sides of a match.
    #[serde(with = "na")]
    pub rake: Option<f64>,
    #[serde(with = "na")]
    pub expected_profit: Option<f64>,
    #[serde(with = "na")]
    pub profit_variance: Option<f64>,
    #[serde(with = "na")]
    pub kelly: Option<f64>,
}

impl MetricsResult {
    pub fn unavailable() -> Self {
        Self {
            probability: None,
            platform_odds: OddsQuote::Unavailable,
            rake: None,
            expected_profit: None,
            profit_variance: None,
            kelly: None,
        }
    }
}

/// Metrics for both sides, always computed together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchMetrics {
    pub side_a: MetricsResult,
    pub side_b: MetricsResult,
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Margin-free probability of `side` winning, from reference total odds.
pub fn normalized_probability(side: OddsQuote, opponent: OddsQuote) -> Option<f64> {
    let side = 1.0 / side.value()?;
    let opponent = 1.0 / opponent.value()?;
    Some(side / (side + opponent))
}

/// Platform margin from both sides' net odds, clamped at zero.
pub fn platform_rake(side_a: OddsQuote, side_b: OddsQuote) -> Option<f64> {
    let a = side_a.value()?;
    let b = side_b.value()?;
    let overround = 1.0 / (a + 1.0) + 1.0 / (b + 1.0) - 1.0;
    Some(round_to(overround.max(0.0), RAKE_DECIMALS))
}

/// Compute one side's metrics.
pub fn compute_metrics(
    side_odds: OddsQuote,
    opponent_odds: OddsQuote,
    side_platform: OddsQuote,
    opponent_platform: OddsQuote,
) -> MetricsResult {
    let probability = normalized_probability(side_odds, opponent_odds);
    let rake = platform_rake(side_platform, opponent_platform);

    let priced = probability.zip(side_platform.value());
    MetricsResult {
        probability,
        platform_odds: side_platform,
        rake,
        expected_profit: priced.map(|(p, b)| expected_profit(p, b)),
        profit_variance: priced.map(|(p, b)| profit_variance(p, b)),
        kelly: priced.map(|(p, b)| kelly_fraction(p, b)),
    }
}

/// Compute both sides of a match in one pass.
pub fn compute_match_metrics(
    odds_a: OddsQuote,
    odds_b: OddsQuote,
    platform_a: OddsQuote,
    platform_b: OddsQuote,
) -> MatchMetrics {
    MatchMetrics {
        side_a: compute_metrics(odds_a, odds_b, platform_a, platform_b),
        side_b: compute_metrics(odds_b, odds_a, platform_b, platform_a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;

    fn q(v: f64) -> OddsQuote {
        OddsQuote::Value(v)
    }

    #[test]
    fn test_probabilities_remove_margin() {
        // 1.80 / 2.00 → implied 0.5556 + 0.5 = 1.0556
        let p = normalized_probability(q(1.8), q(2.0)).unwrap();
        assert_relative_eq!(p, (1.0 / 1.8) / (1.0 / 1.8 + 0.5), epsilon = 1e-12);
        assert!(p > 0.5);
    }

    #[test]
    fn test_probabilities_sum_to_one_sampled() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let a = rng.gen_range(1.01..30.0);
            let b = rng.gen_range(1.01..30.0);
            let m = compute_match_metrics(q(a), q(b), OddsQuote::Unavailable, OddsQuote::Unavailable);
            let sum = m.side_a.probability.unwrap() + m.side_b.probability.unwrap();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_rake_is_non_negative_sampled() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let a = rng.gen_range(0.01..20.0);
            let b = rng.gen_range(0.01..20.0);
            assert!(platform_rake(q(a), q(b)).unwrap() >= 0.0);
        }
    }

    #[test]
    fn test_rake_value_and_rounding() {
        // 0.9 / 0.9 net → 1/1.9 · 2 − 1 = 0.052631…
        assert_relative_eq!(platform_rake(q(0.9), q(0.9)).unwrap(), 0.05263, epsilon = 1e-12);
        // Generous book → clamped
        assert_eq!(platform_rake(q(1.5), q(1.5)), Some(0.0));
    }

    #[test]
    fn test_rake_needs_both_sides() {
        assert_eq!(platform_rake(q(0.9), OddsQuote::Unavailable), None);
        let m = compute_match_metrics(q(1.8), q(2.0), q(0.9), OddsQuote::Unavailable);
        assert_eq!(m.side_a.rake, None);
        assert!(m.side_a.kelly.is_some());
        assert_eq!(m.side_b.kelly, None);
    }

    #[test]
    fn test_rake_shared_by_both_sides() {
        let m = compute_match_metrics(q(1.7), q(2.2), q(0.75), q(1.05));
        assert_eq!(m.side_a.rake, m.side_b.rake);
    }

    #[test]
    fn test_full_side_metrics() {
        // Even reference → p = 0.5 each; platform net 1.2 on A.
        let m = compute_metrics(q(2.0), q(2.0), q(1.2), q(0.7));
        assert_relative_eq!(m.probability.unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(m.expected_profit.unwrap(), 0.1, epsilon = 1e-12);
        assert_relative_eq!(m.kelly.unwrap(), 0.1 / 1.2, epsilon = 1e-12);
        assert_relative_eq!(m.profit_variance.unwrap(), 0.25 * 2.2 * 2.2, epsilon = 1e-12);
        assert_eq!(m.platform_odds, q(1.2));
    }

    #[test]
    fn test_bad_reference_blanks_dependent_fields() {
        let m = compute_metrics(OddsQuote::Unavailable, q(2.0), q(1.0), q(1.0));
        assert_eq!(m.probability, None);
        assert_eq!(m.expected_profit, None);
        assert_eq!(m.kelly, None);
        // Rake only depends on platform odds
        assert!(m.rake.is_some());
    }

    #[test]
    fn test_kelly_within_bounds() {
        let m = compute_match_metrics(q(1.1), q(9.0), q(3.0), q(0.2));
        for side in [m.side_a, m.side_b] {
            let k = side.kelly.unwrap();
            assert!((0.0..=1.0).contains(&k));
        }
    }

    #[test]
    fn test_idempotent() {
        let first = compute_match_metrics(q(1.65), q(2.3), q(0.62), q(1.25));
        let second = compute_match_metrics(q(1.65), q(2.3), q(0.62), q(1.25));
        assert_eq!(
            serde_json::to_vec(&[first.side_a, first.side_b]).unwrap(),
            serde_json::to_vec(&[second.side_a, second.side_b]).unwrap()
        );
    }
}

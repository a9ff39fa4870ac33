//! Bet ledger arithmetic: profit per settled bet and running summary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetResult {
    Pending,
    Win,
    Lose,
}

impl FromStr for BetResult {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "none" | "" => Ok(BetResult::Pending),
            "win" | "won" | "w" => Ok(BetResult::Win),
            "lose" | "loss" | "lost" | "l" => Ok(BetResult::Lose),
            other => anyhow::bail!("unknown bet result '{other}' (expected win, lose or pending)"),
        }
    }
}

impl fmt::Display for BetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BetResult::Pending => "pending",
            BetResult::Win => "win",
            BetResult::Lose => "lose",
        };
        f.write_str(s)
    }
}

/// Profit of one bet at platform net odds.
///
/// A win without a known price books nothing rather than guessing.
pub fn bet_profit(result: BetResult, net_odds: Option<f64>, stake: f64) -> f64 {
    if stake <= 0.0 {
        return 0.0;
    }
    match result {
        BetResult::Win => net_odds.map(|b| b * stake).unwrap_or(0.0),
        BetResult::Lose => -stake,
        BetResult::Pending => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub bets: usize,
    pub settled: usize,
    pub wins: usize,
    pub total_staked: f64,
    pub total_profit: f64,
    /// wins / settled, 0 when nothing has settled.
    pub success_rate: f64,
}

/// Summarise `(result, net_odds, stake)` triples. Zero stakes are ignored.
pub fn summarize<I>(bets: I) -> LedgerSummary
where
    I: IntoIterator<Item = (BetResult, Option<f64>, f64)>,
{
    let mut summary = LedgerSummary {
        bets: 0,
        settled: 0,
        wins: 0,
        total_staked: 0.0,
        total_profit: 0.0,
        success_rate: 0.0,
    };
    for (result, odds, stake) in bets {
        if stake <= 0.0 {
            continue;
        }
        summary.bets += 1;
        summary.total_staked += stake;
        summary.total_profit += bet_profit(result, odds, stake);
        match result {
            BetResult::Win => {
                summary.settled += 1;
                summary.wins += 1;
            }
            BetResult::Lose => summary.settled += 1,
            BetResult::Pending => {}
        }
    }
    if summary.settled > 0 {
        summary.success_rate = summary.wins as f64 / summary.settled as f64;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_profit_per_result() {
        assert_relative_eq!(bet_profit(BetResult::Win, Some(0.85), 100.0), 85.0, epsilon = 1e-9);
        assert_relative_eq!(bet_profit(BetResult::Lose, Some(0.85), 100.0), -100.0, epsilon = 1e-9);
        assert_eq!(bet_profit(BetResult::Pending, Some(0.85), 100.0), 0.0);
        assert_eq!(bet_profit(BetResult::Win, None, 100.0), 0.0);
        assert_eq!(bet_profit(BetResult::Lose, Some(0.85), 0.0), 0.0);
    }

    #[test]
    fn test_summary() {
        let s = summarize(vec![
            (BetResult::Win, Some(1.0), 200.0),
            (BetResult::Lose, Some(0.5), 100.0),
            (BetResult::Pending, Some(0.9), 50.0),
            (BetResult::Win, Some(2.0), 0.0),
        ]);
        assert_eq!(s.bets, 3);
        assert_eq!(s.settled, 2);
        assert_eq!(s.wins, 1);
        assert_relative_eq!(s.total_staked, 350.0, epsilon = 1e-9);
        assert_relative_eq!(s.total_profit, 100.0, epsilon = 1e-9);
        assert_relative_eq!(s.success_rate, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_summary_nothing_settled() {
        let s = summarize(vec![(BetResult::Pending, None, 10.0)]);
        assert_eq!(s.success_rate, 0.0);
    }

    #[test]
    fn test_parse_result() {
        assert_eq!("Win".parse::<BetResult>().unwrap(), BetResult::Win);
        assert_eq!("lose".parse::<BetResult>().unwrap(), BetResult::Lose);
        assert_eq!("None".parse::<BetResult>().unwrap(), BetResult::Pending);
        assert!("draw".parse::<BetResult>().is_err());
    }
}

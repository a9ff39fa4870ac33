//! Persistent match book: one primary table plus the derived tables, all
//! joined by `MatchID`.
//!
//! [`MatchBook`] is a plain value. Reading and committing it is the job of a
//! [`StoreBackend`]; nothing in here touches the filesystem.

use anyhow::Result;
use chrono::Duration;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::analytics::allocation::KellyWeighted;
use crate::analytics::metrics::{compute_match_metrics, MatchMetrics, MetricsResult};
use crate::analytics::odds::OddsQuote;
use crate::analytics::settlement::{summarize, BetResult, LedgerSummary};
use crate::reconcile::time_label::TimeLabelParser;

pub mod json;
pub mod models;
pub mod sqlite;

pub use json::JsonDirStore;
pub use models::*;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is locked by another writer ({0})")]
    Locked(String),
    #[error("no match with id {0}")]
    UnknownMatch(String),
    #[error("match {0} is a one-sided placeholder and has no opponent")]
    Placeholder(String),
    #[error("invalid side '{0}' (expected a or b)")]
    InvalidSide(String),
    #[error("no bet on {side} of match {match_id}")]
    UnknownBet { match_id: String, side: Side },
}

/// Load/commit collaborator for a [`MatchBook`].
///
/// `commit` is all-or-nothing: after an error, a subsequent `load` returns
/// the previously committed book.
pub trait StoreBackend {
    fn load(&self) -> Result<MatchBook>;

    fn commit(&self, book: &MatchBook) -> Result<()>;

    /// Human-readable location for logging.
    fn describe(&self) -> String;
}

/// The primary table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchStore {
    pub matches: Vec<MatchRecord>,
}

/// The three derived tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsStore {
    pub odds: Vec<OddsProbabilityRow>,
    pub platform: Vec<PlatformOddsRow>,
    pub profit: Vec<ProfitRow>,
}

/// Everything that is committed as one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchBook {
    pub matches: MatchStore,
    pub metrics: MetricsStore,
    pub bets: Vec<BetRecord>,
}

/// One side of one match, joined across the tables.
#[derive(Debug, Clone, Serialize)]
pub struct SideView {
    pub match_id: String,
    pub side: Side,
    pub team: String,
    pub time_label: String,
    pub reference_odds: String,
    pub metrics: MetricsResult,
}

impl KellyWeighted for SideView {
    fn kelly(&self) -> f64 {
        self.metrics.kelly.unwrap_or(0.0)
    }
}

impl MatchBook {
    pub fn find(&self, match_id: &str) -> Option<&MatchRecord> {
        self.matches.matches.iter().find(|m| m.match_id == match_id)
    }

    pub fn find_mut(&mut self, match_id: &str) -> Option<&mut MatchRecord> {
        self.matches.matches.iter_mut().find(|m| m.match_id == match_id)
    }

    /// `max(existing numeric ids) + 1`, zero-padded to four digits.
    pub fn next_match_id(&self) -> String {
        let next = self
            .matches
            .matches
            .iter()
            .filter_map(|m| m.match_id.trim().parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        format!("{next:04}")
    }

    /// Append blank derived rows for `match_id` where missing.
    pub fn ensure_metric_rows(&mut self, match_id: &str) {
        let m = &mut self.metrics;
        if !m.odds.iter().any(|r| r.match_id == match_id) {
            m.odds.push(OddsProbabilityRow::empty(match_id));
        }
        if !m.platform.iter().any(|r| r.match_id == match_id) {
            m.platform.push(PlatformOddsRow::empty(match_id));
        }
        if !m.profit.iter().any(|r| r.match_id == match_id) {
            m.profit.push(ProfitRow::empty(match_id));
        }
    }

    pub fn platform_odds(&self, match_id: &str) -> (OddsQuote, OddsQuote) {
        self.metrics
            .platform
            .iter()
            .find(|r| r.match_id == match_id)
            .map_or((OddsQuote::Unavailable, OddsQuote::Unavailable), |r| {
                (r.platform_odds_a, r.platform_odds_b)
            })
    }

    /// Recompute both sides of a match from its stored reference and
    /// platform odds, then upsert the derived rows. Placeholders are left
    /// with blank metrics.
    pub fn refresh_metrics(&mut self, match_id: &str) -> Result<Option<MatchMetrics>, StoreError> {
        let record = self
            .find(match_id)
            .ok_or_else(|| StoreError::UnknownMatch(match_id.to_string()))?;
        let (placeholder, odds_a, odds_b) = (record.is_placeholder(), record.odds_a, record.odds_b);
        if placeholder {
            self.ensure_metric_rows(match_id);
            return Ok(None);
        }
        let (platform_a, platform_b) = self.platform_odds(match_id);
        let metrics = compute_match_metrics(odds_a, odds_b, platform_a, platform_b);
        self.write_metrics(match_id, odds_a, odds_b, &metrics);
        debug!(match_id, "Metrics refreshed");
        Ok(Some(metrics))
    }

    fn write_metrics(
        &mut self,
        match_id: &str,
        odds_a: OddsQuote,
        odds_b: OddsQuote,
        metrics: &MatchMetrics,
    ) {
        self.ensure_metric_rows(match_id);
        let (a, b) = (metrics.side_a, metrics.side_b);
        let store = &mut self.metrics;

        if let Some(row) = store.odds.iter_mut().find(|r| r.match_id == match_id) {
            *row = OddsProbabilityRow {
                match_id: match_id.to_string(),
                odds_a,
                probability_a: a.probability,
                rake_a: a.rake,
                odds_b,
                probability_b: b.probability,
                rake_b: b.rake,
            };
        }
        if let Some(row) = store.platform.iter_mut().find(|r| r.match_id == match_id) {
            *row = PlatformOddsRow {
                match_id: match_id.to_string(),
                platform_odds_a: a.platform_odds,
                rake_a: a.rake,
                platform_odds_b: b.platform_odds,
                rake_b: b.rake,
            };
        }
        if let Some(row) = store.profit.iter_mut().find(|r| r.match_id == match_id) {
            *row = ProfitRow {
                match_id: match_id.to_string(),
                expected_profit_a: a.expected_profit,
                variance_a: a.profit_variance,
                kelly_a: a.kelly,
                expected_profit_b: b.expected_profit,
                variance_b: b.profit_variance,
                kelly_b: b.kelly,
            };
        }
    }

    /// Record the platform odds for one side and recompute the match.
    pub fn set_platform_odds(
        &mut self,
        match_id: &str,
        side: Side,
        quote: OddsQuote,
    ) -> Result<MatchMetrics, StoreError> {
        let record = self
            .find(match_id)
            .ok_or_else(|| StoreError::UnknownMatch(match_id.to_string()))?;
        if record.is_placeholder() {
            return Err(StoreError::Placeholder(match_id.to_string()));
        }
        self.ensure_metric_rows(match_id);
        if let Some(row) = self.metrics.platform.iter_mut().find(|r| r.match_id == match_id) {
            match side {
                Side::A => row.platform_odds_a = quote,
                Side::B => row.platform_odds_b = quote,
            }
        }
        self.refresh_metrics(match_id)?
            .ok_or_else(|| StoreError::Placeholder(match_id.to_string()))
    }

    /// Stored metrics of one side, joined from the derived tables by id.
    pub fn side_metrics(&self, match_id: &str, side: Side) -> MetricsResult {
        let m = &self.metrics;
        let odds = m.odds.iter().find(|r| r.match_id == match_id);
        let platform = m.platform.iter().find(|r| r.match_id == match_id);
        let profit = m.profit.iter().find(|r| r.match_id == match_id);

        let pick = |a: Option<f64>, b: Option<f64>| match side {
            Side::A => a,
            Side::B => b,
        };
        MetricsResult {
            probability: odds.and_then(|r| pick(r.probability_a, r.probability_b)),
            platform_odds: platform.map_or(OddsQuote::Unavailable, |r| r.odds(side)),
            rake: platform.and_then(|r| pick(r.rake_a, r.rake_b)),
            expected_profit: profit.and_then(|r| pick(r.expected_profit_a, r.expected_profit_b)),
            profit_variance: profit.and_then(|r| pick(r.variance_a, r.variance_b)),
            kelly: profit.and_then(|r| pick(r.kelly_a, r.kelly_b)),
        }
    }

    /// Every existing side in table order (side A before side B).
    pub fn side_views(&self) -> Vec<SideView> {
        let mut views = Vec::new();
        for record in &self.matches.matches {
            for side in [Side::A, Side::B] {
                let Some(team) = record.team(side) else {
                    continue;
                };
                let raw = record.raw_odds(side);
                let reference_odds = if raw.is_empty() {
                    crate::analytics::odds::fmt_or_na(record.odds(side).value(), 2)
                } else {
                    raw.to_string()
                };
                views.push(SideView {
                    match_id: record.match_id.clone(),
                    side,
                    team: team.to_string(),
                    time_label: record.time_label.clone(),
                    reference_odds,
                    metrics: self.side_metrics(&record.match_id, side),
                });
            }
        }
        views
    }

    /// Sides with a positive Kelly fraction, best first.
    pub fn rank_opportunities(&self) -> Vec<SideView> {
        let mut ranked: Vec<SideView> = self
            .side_views()
            .into_iter()
            .filter(|v| v.metrics.kelly.is_some_and(|k| k > 0.0))
            .collect();
        ranked.sort_by(|a, b| {
            b.kelly()
                .partial_cmp(&a.kelly())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.match_id.cmp(&b.match_id))
                .then_with(|| a.side.cmp(&b.side))
        });
        ranked
    }

    /// Record (or replace) the stake on one side. Result resets to pending.
    pub fn place_bet(&mut self, match_id: &str, side: Side, stake: f64) -> Result<(), StoreError> {
        let record = self
            .find(match_id)
            .ok_or_else(|| StoreError::UnknownMatch(match_id.to_string()))?;
        let team = record
            .team(side)
            .ok_or_else(|| StoreError::Placeholder(match_id.to_string()))?
            .to_string();

        let bet = BetRecord {
            match_id: match_id.to_string(),
            side,
            team,
            stake,
            result: BetResult::Pending,
        };
        match self
            .bets
            .iter_mut()
            .find(|b| b.match_id == match_id && b.side == side)
        {
            Some(existing) => *existing = bet,
            None => self.bets.push(bet),
        }
        Ok(())
    }

    pub fn settle_bet(&mut self, match_id: &str, side: Side, result: BetResult) -> Result<(), StoreError> {
        let bet = self
            .bets
            .iter_mut()
            .find(|b| b.match_id == match_id && b.side == side)
            .ok_or_else(|| StoreError::UnknownBet {
                match_id: match_id.to_string(),
                side,
            })?;
        bet.result = result;
        Ok(())
    }

    /// Ledger summary, optionally limited to matches scheduled within
    /// `window_days` before the parser's reference date (or later).
    pub fn ledger_summary(&self, times: &TimeLabelParser, window_days: Option<i64>) -> LedgerSummary {
        let cutoff = window_days.and_then(|d| {
            times
                .today
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight - Duration::days(d))
        });

        let items = self.bets.iter().filter_map(|bet| {
            let record = self.find(&bet.match_id)?;
            if let Some(cutoff) = cutoff {
                let kickoff = times.parse(&record.time_label)?;
                if kickoff < cutoff {
                    return None;
                }
            }
            let odds = self.side_metrics(&bet.match_id, bet.side).platform_odds.value();
            Some((bet.result, odds, bet.stake))
        });
        summarize(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn record(id: &str, a: f64, b: f64) -> MatchRecord {
        MatchRecord {
            match_id: id.into(),
            group: "g".into(),
            time_label: "03-01 18:00".into(),
            team_a: format!("A{id}"),
            team_b: Some(format!("B{id}")),
            odds_a: OddsQuote::Value(a),
            odds_b: OddsQuote::Value(b),
            raw_odds_a: a.to_string(),
            raw_odds_b: b.to_string(),
            schedule: None,
        }
    }

    fn book_with(records: Vec<MatchRecord>) -> MatchBook {
        let mut book = MatchBook::default();
        for r in records {
            let id = r.match_id.clone();
            book.matches.matches.push(r);
            book.refresh_metrics(&id).unwrap();
        }
        book
    }

    #[test]
    fn test_next_match_id() {
        let mut book = MatchBook::default();
        assert_eq!(book.next_match_id(), "0001");
        book.matches.matches.push(record("0009", 2.0, 2.0));
        book.matches.matches.push(record("legacy", 2.0, 2.0));
        assert_eq!(book.next_match_id(), "0010");
    }

    #[test]
    fn test_refresh_fills_probability_without_platform_odds() {
        let book = book_with(vec![record("0001", 2.0, 2.0)]);
        let a = book.side_metrics("0001", Side::A);
        assert_relative_eq!(a.probability.unwrap(), 0.5, epsilon = 1e-12);
        assert_eq!(a.kelly, None);
        assert_eq!(book.metrics.odds.len(), 1);
        assert_eq!(book.metrics.platform.len(), 1);
        assert_eq!(book.metrics.profit.len(), 1);
    }

    #[test]
    fn test_set_platform_odds_recomputes_both_sides() {
        let mut book = book_with(vec![record("0001", 2.0, 2.0)]);
        book.set_platform_odds("0001", Side::A, OddsQuote::Value(1.2)).unwrap();
        assert_eq!(book.side_metrics("0001", Side::A).rake, None);

        let m = book.set_platform_odds("0001", Side::B, OddsQuote::Value(0.7)).unwrap();
        let a = book.side_metrics("0001", Side::A);
        let b = book.side_metrics("0001", Side::B);
        assert_eq!(a, m.side_a);
        assert_eq!(b, m.side_b);
        assert!(a.rake.is_some());
        assert_eq!(a.rake, b.rake);
        assert_relative_eq!(a.kelly.unwrap(), 0.1 / 1.2, epsilon = 1e-12);
    }

    #[test]
    fn test_joins_by_id_not_by_odds_value() {
        // Identical odds everywhere: each match must still read its own rows.
        let mut book = book_with(vec![record("0001", 1.9, 1.9), record("0002", 1.9, 1.9)]);
        book.set_platform_odds("0002", Side::A, OddsQuote::Value(0.95)).unwrap();
        assert_eq!(book.side_metrics("0001", Side::A).platform_odds, OddsQuote::Unavailable);
        assert_eq!(book.side_metrics("0002", Side::A).platform_odds, OddsQuote::Value(0.95));
    }

    #[test]
    fn test_placeholder_rejects_platform_odds() {
        let mut rec = record("0001", 1.5, 2.5);
        rec.team_b = None;
        let mut book = book_with(vec![rec]);
        let err = book.set_platform_odds("0001", Side::A, OddsQuote::Value(1.0)).unwrap_err();
        assert!(matches!(err, StoreError::Placeholder(_)));
        assert_eq!(book.side_views().len(), 1);
    }

    #[test]
    fn test_unknown_match() {
        let mut book = MatchBook::default();
        let err = book.set_platform_odds("0042", Side::A, OddsQuote::Value(1.0)).unwrap_err();
        assert!(matches!(err, StoreError::UnknownMatch(_)));
    }

    #[test]
    fn test_rank_opportunities_sorted_desc() {
        let mut book = book_with(vec![record("0001", 2.0, 2.0), record("0002", 1.5, 3.0)]);
        book.set_platform_odds("0001", Side::A, OddsQuote::Value(1.2)).unwrap();
        book.set_platform_odds("0001", Side::B, OddsQuote::Value(0.7)).unwrap();
        book.set_platform_odds("0002", Side::A, OddsQuote::Value(0.9)).unwrap();
        book.set_platform_odds("0002", Side::B, OddsQuote::Value(1.5)).unwrap();

        let ranked = book.rank_opportunities();
        assert!(!ranked.is_empty());
        assert!(ranked.iter().all(|v| v.kelly() > 0.0));
        for pair in ranked.windows(2) {
            assert!(pair[0].kelly() >= pair[1].kelly());
        }
    }

    #[test]
    fn test_ledger_summary_window() {
        let mut old = record("0001", 2.0, 2.0);
        old.time_label = "01-10 18:00".into();
        let mut book = book_with(vec![old, record("0002", 2.0, 2.0)]);
        book.set_platform_odds("0002", Side::A, OddsQuote::Value(0.8)).unwrap();
        book.place_bet("0001", Side::A, 100.0).unwrap();
        book.place_bet("0002", Side::A, 50.0).unwrap();
        book.settle_bet("0001", Side::A, BetResult::Lose).unwrap();
        book.settle_bet("0002", Side::A, BetResult::Win).unwrap();

        let times = TimeLabelParser::new("unknown", NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        let all = book.ledger_summary(&times, None);
        assert_eq!(all.settled, 2);
        assert_relative_eq!(all.total_profit, -60.0, epsilon = 1e-9);

        let recent = book.ledger_summary(&times, Some(3));
        assert_eq!(recent.bets, 1);
        assert_relative_eq!(recent.total_profit, 40.0, epsilon = 1e-9);
        assert_relative_eq!(recent.success_rate, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_settle_without_bet_names_the_bet() {
        let mut book = book_with(vec![record("0001", 2.0, 2.0)]);
        let err = book.settle_bet("0001", Side::A, BetResult::Win).unwrap_err();
        assert!(matches!(&err, StoreError::UnknownBet { match_id, side: Side::A } if match_id == "0001"));
        assert_eq!(err.to_string(), "no bet on TeamA of match 0001");
    }

    #[test]
    fn test_place_bet_replaces_existing() {
        let mut book = book_with(vec![record("0001", 2.0, 2.0)]);
        book.place_bet("0001", Side::B, 10.0).unwrap();
        book.settle_bet("0001", Side::B, BetResult::Win).unwrap();
        book.place_bet("0001", Side::B, 25.0).unwrap();
        assert_eq!(book.bets.len(), 1);
        assert_eq!(book.bets[0].stake, 25.0);
        assert_eq!(book.bets[0].result, BetResult::Pending);
        assert_eq!(book.bets[0].team, "B0001");
    }
}

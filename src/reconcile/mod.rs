//! Merge freshly scraped match snapshots into a [`MatchBook`].
//!
//! A snapshot is matched against the stored records in this order:
//!   1. exact identity (group, time label, team pair)
//!   2. same group and team pair with a kickoff within the close threshold
//!   3. same group and team pair whose stored time is still unknown
//!
//! Relative labels (`today 18:00`) are pinned to a calendar day before
//! matching, so stored labels do not drift as days pass.
//!
//! Anything unmatched becomes a new record with the next free `MatchID`.
//! Platform odds and bets live in other tables and are never touched here,
//! so they survive any number of re-ingests.

use chrono::Duration;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::analytics::odds::{OddsConfig, OddsQuote};
use crate::store::{MatchBook, MatchIdentity, MatchRecord};

pub mod time_label;

use time_label::TimeLabelParser;

/// Default window within which two time labels denote the same kickoff.
pub const DEFAULT_CLOSE_MATCH_HOURS: i64 = 3;

/// One observed match as scraped, before reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSnapshot {
    pub group: String,
    pub time_label: String,
    pub team_a: String,
    pub odds_a: String,
    /// `None` for a one-sided placeholder.
    pub team_b: Option<String>,
    pub odds_b: Option<String>,
    /// Free-text schedule note shown while the kickoff time is unknown.
    pub annotation: Option<String>,
}

impl MatchSnapshot {
    pub fn identity(&self) -> MatchIdentity {
        MatchIdentity {
            group: self.group.clone(),
            time_label: self.time_label.clone(),
            team_a: self.team_a.clone(),
            team_b: self.team_b.clone(),
        }
    }

    fn problem(&self) -> Option<&'static str> {
        if self.team_a.trim().is_empty() {
            return Some("empty team A");
        }
        match self.team_b.as_deref().map(str::trim) {
            Some("") => Some("empty team B"),
            Some(b) if b == self.team_a.trim() => Some("team plays itself"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub odds: OddsConfig,
    pub times: TimeLabelParser,
    pub close_threshold: Duration,
}

/// Result of one batch.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub book: MatchBook,
    pub new_records: Vec<MatchRecord>,
    /// IDs of pre-existing records refreshed by the batch.
    pub updated: Vec<String>,
    pub skipped: usize,
}

pub fn reconcile(mut book: MatchBook, batch: Vec<MatchSnapshot>, config: &ReconcileConfig) -> Reconciled {
    let existing: Vec<String> = book.matches.matches.iter().map(|m| m.match_id.clone()).collect();
    let mut new_ids: Vec<String> = Vec::new();
    let mut updated: Vec<String> = Vec::new();
    let mut skipped = 0;

    for mut snapshot in batch {
        snapshot.time_label = config.times.normalize(&snapshot.time_label);
        if let Some(problem) = snapshot.problem() {
            warn!(
                group = %snapshot.group,
                team_a = %snapshot.team_a,
                "Skipping malformed snapshot: {}",
                problem
            );
            skipped += 1;
            continue;
        }

        let match_id = match find_existing(&book, &snapshot, config) {
            Some(id) => {
                apply_update(&mut book, &id, &snapshot, config);
                if existing.contains(&id) && !updated.contains(&id) {
                    updated.push(id.clone());
                }
                id
            }
            None => {
                let id = book.next_match_id();
                debug!(match_id = %id, team_a = %snapshot.team_a, "New match");
                book.matches.matches.push(new_record(&id, &snapshot, &config.odds));
                new_ids.push(id.clone());
                id
            }
        };

        if let Err(e) = book.refresh_metrics(&match_id) {
            warn!(match_id = %match_id, "Metrics refresh failed: {}", e);
        }
    }

    let new_records = new_ids
        .iter()
        .filter_map(|id| book.find(id).cloned())
        .collect();

    info!(
        new = new_ids.len(),
        updated = updated.len(),
        skipped,
        "Reconciled snapshot batch"
    );

    Reconciled {
        book,
        new_records,
        updated,
        skipped,
    }
}

fn find_existing(book: &MatchBook, snapshot: &MatchSnapshot, config: &ReconcileConfig) -> Option<String> {
    let identity = snapshot.identity();
    let records = &book.matches.matches;

    if let Some(exact) = records.iter().find(|m| m.identity() == identity) {
        return Some(exact.match_id.clone());
    }

    let times = &config.times;
    times.parse(&snapshot.time_label)?;

    let closest = records
        .iter()
        .filter(|m| m.identity().same_fixture(&identity))
        .filter_map(|m| {
            let gap = times.gap(&m.time_label, &snapshot.time_label)?;
            (gap <= config.close_threshold).then_some((gap, m))
        })
        .min_by_key(|(gap, _)| *gap);
    if let Some((_, m)) = closest {
        return Some(m.match_id.clone());
    }

    records
        .iter()
        .find(|m| m.identity().same_fixture(&identity) && times.is_unknown(&m.time_label))
        .map(|m| m.match_id.clone())
}

fn apply_update(book: &mut MatchBook, match_id: &str, snapshot: &MatchSnapshot, config: &ReconcileConfig) {
    let kickoff_known = config.times.parse(&snapshot.time_label).is_some();
    let Some(record) = book.find_mut(match_id) else {
        return;
    };
    let (odds_a, odds_b) = parse_pair(snapshot, &config.odds);
    record.time_label = snapshot.time_label.clone();
    record.odds_a = odds_a;
    record.odds_b = odds_b;
    record.raw_odds_a = snapshot.odds_a.trim().to_string();
    record.raw_odds_b = snapshot.odds_b.as_deref().unwrap_or("").trim().to_string();

    if snapshot.annotation.is_some() {
        record.schedule = snapshot.annotation.clone();
    } else if kickoff_known {
        // A real kickoff supersedes the placeholder note.
        record.schedule = None;
    }
}

fn new_record(match_id: &str, snapshot: &MatchSnapshot, odds: &OddsConfig) -> MatchRecord {
    let (odds_a, odds_b) = parse_pair(snapshot, odds);
    MatchRecord {
        match_id: match_id.to_string(),
        group: snapshot.group.clone(),
        time_label: snapshot.time_label.clone(),
        team_a: snapshot.team_a.clone(),
        team_b: snapshot.team_b.clone(),
        odds_a,
        odds_b,
        raw_odds_a: snapshot.odds_a.trim().to_string(),
        raw_odds_b: snapshot.odds_b.as_deref().unwrap_or("").trim().to_string(),
        schedule: snapshot.annotation.clone(),
    }
}

fn parse_pair(snapshot: &MatchSnapshot, odds: &OddsConfig) -> (OddsQuote, OddsQuote) {
    let b = match (&snapshot.team_b, &snapshot.odds_b) {
        (Some(_), Some(token)) => odds.parse(token),
        _ => OddsQuote::Unavailable,
    };
    (odds.parse(&snapshot.odds_a), b)
}

/// One row of the single-team feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyRow {
    #[serde(rename = "Team")]
    pub team: String,
    #[serde(rename = "Odds")]
    pub odds: String,
}

/// Pair consecutive single-team rows into matches. A trailing odd row
/// becomes a one-sided placeholder.
pub fn pair_legacy_feed(group: &str, time_label: &str, rows: Vec<LegacyRow>) -> Vec<MatchSnapshot> {
    let rows: Vec<LegacyRow> = rows
        .into_iter()
        .filter(|r| {
            let keep = !r.team.trim().is_empty();
            if !keep {
                warn!(odds = %r.odds, "Skipping legacy row without a team name");
            }
            keep
        })
        .collect();

    rows.chunks(2)
        .map(|pair| {
            let (first, second) = (&pair[0], pair.get(1));
            MatchSnapshot {
                group: group.to_string(),
                time_label: time_label.to_string(),
                team_a: first.team.trim().to_string(),
                odds_a: first.odds.clone(),
                team_b: second.map(|r| r.team.trim().to_string()),
                odds_b: second.map(|r| r.odds.clone()),
                annotation: None,
            }
        })
        .collect()
}

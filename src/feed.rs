//! CSV snapshot feeds.
//!
//! Two shapes are understood:
//!   - multi-match: `time,team_a,odds_a,team_b,odds_b[,annotation]`
//!   - single-team legacy: `Team,Odds`, paired two rows at a time
//!
//! A row that fails to deserialize is logged and skipped; only an
//! unreadable file is an error. One-sided placeholders only come from the
//! legacy shape: a multi-match row without team B never becomes one.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::reconcile::{pair_legacy_feed, LegacyRow, MatchSnapshot};

#[derive(Debug, Deserialize)]
struct FeedRow {
    time: String,
    team_a: String,
    odds_a: String,
    team_b: String,
    #[serde(default)]
    odds_b: Option<String>,
    #[serde(default)]
    annotation: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl FeedRow {
    fn into_snapshot(self, group: &str, unknown_label: &str) -> MatchSnapshot {
        let time_label = if self.time.trim().is_empty() {
            unknown_label.to_string()
        } else {
            self.time
        };
        MatchSnapshot {
            group: group.to_string(),
            time_label,
            team_a: self.team_a,
            odds_a: self.odds_a,
            // Always two-sided here; a blank team B is rejected downstream.
            team_b: Some(self.team_b),
            odds_b: Some(self.odds_b.unwrap_or_default()),
            annotation: non_empty(self.annotation),
        }
    }
}

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open feed {:?}", path))
}

/// Read a multi-match feed into snapshots for `group`. An empty time cell
/// becomes the unknown label.
pub fn read_match_feed(path: &Path, group: &str, unknown_label: &str) -> Result<Vec<MatchSnapshot>> {
    let mut reader = reader(path)?;
    let mut snapshots = Vec::new();

    for (line, result) in reader.deserialize::<FeedRow>().enumerate() {
        match result {
            Ok(row) => snapshots.push(row.into_snapshot(group, unknown_label)),
            Err(e) => warn!(row = line + 1, "Skipping unreadable feed row: {}", e),
        }
    }

    info!(path = ?path, snapshots = snapshots.len(), "Match feed read");
    Ok(snapshots)
}

/// Read a `Team,Odds` feed and pair it into snapshots.
pub fn read_legacy_feed(path: &Path, group: &str, unknown_label: &str) -> Result<Vec<MatchSnapshot>> {
    let mut reader = reader(path)?;
    let mut rows = Vec::new();

    for (line, result) in reader.deserialize::<LegacyRow>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => warn!(row = line + 1, "Skipping unreadable legacy row: {}", e),
        }
    }

    let snapshots = pair_legacy_feed(group, unknown_label, rows);
    info!(path = ?path, snapshots = snapshots.len(), "Legacy feed read");
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_feed(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_match_feed_rows() {
        let file = write_feed(
            "time,team_a,odds_a,team_b,odds_b,annotation\n\
             03-03 18:00, Team X ,1.45,Team Y,2.70,\n\
             ,Team Z,-,Team W,25,after the final\n",
        );
        let snaps = read_match_feed(file.path(), "iem", "unknown").unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].team_a, "Team X");
        assert_eq!(snaps[0].annotation, None);
        assert_eq!(snaps[1].time_label, "unknown");
        assert_eq!(snaps[1].odds_a, "-");
        assert_eq!(snaps[1].annotation.as_deref(), Some("after the final"));
    }

    #[test]
    fn test_match_feed_without_annotation_column() {
        let file = write_feed("time,team_a,odds_a,team_b,odds_b\ntoday 20:00,A,1.9,B,1.9\n");
        let snaps = read_match_feed(file.path(), "g", "unknown").unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].team_b.as_deref(), Some("B"));
    }

    #[test]
    fn test_match_feed_row_without_team_b_is_skipped() {
        use crate::analytics::odds::OddsConfig;
        use crate::reconcile::time_label::TimeLabelParser;
        use crate::reconcile::{reconcile, ReconcileConfig};
        use crate::store::MatchBook;

        let file = write_feed(
            "time,team_a,odds_a,team_b,odds_b\n\
             03-03 18:00,X,1.5,,\n\
             03-03 20:00,Z\n\
             03-03 21:00,P,1.9,Q,\n",
        );
        let snaps = read_match_feed(file.path(), "g", "unknown").unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].team_b.as_deref(), Some(""));

        let cfg = ReconcileConfig {
            odds: OddsConfig::default(),
            times: TimeLabelParser::new("unknown", chrono::NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()),
            close_threshold: chrono::Duration::hours(3),
        };
        let r = reconcile(MatchBook::default(), snaps, &cfg);
        assert_eq!(r.skipped, 1);
        assert_eq!(r.new_records.len(), 1);
        assert!(r.book.matches.matches.iter().all(|m| !m.is_placeholder()));
        assert_eq!(r.new_records[0].odds_b, crate::analytics::odds::OddsQuote::Unavailable);
    }

    #[test]
    fn test_legacy_feed_pairs_rows() {
        let file = write_feed("Team,Odds\nA,1.5\nB,2.6\nC,1.9\n");
        let snaps = read_legacy_feed(file.path(), "cup", "unknown").unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].team_b.as_deref(), Some("B"));
        assert_eq!(snaps[1].team_b, None);
        assert_eq!(snaps[1].time_label, "unknown");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_match_feed(&dir.path().join("absent.csv"), "g", "unknown").is_err());
    }
}

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, Transaction};
use tracing::{debug, info, warn};

use super::models::*;
use super::{MatchBook, MatchStore, MetricsStore, StoreBackend};
use crate::analytics::odds::OddsQuote;
use crate::analytics::settlement::BetResult;

/// SQLite-backed match book. Every commit is one transaction.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: String,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("Failed to open {path}"))?;
        let store = SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_string(),
        };
        // A damaged file reads as empty; the next commit reports the failure.
        if let Err(e) = store.run_migrations() {
            warn!(path, "Schema migration failed: {:#}", e);
        }
        Ok(store)
    }

    /// In-memory database, mainly for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
            path: ":memory:".to_string(),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn read_all(conn: &Connection) -> rusqlite::Result<MatchBook> {
        let mut stmt = conn.prepare(
            "SELECT match_id, group_name, time_label, team_a, team_b,
                    odds_a, odds_b, raw_odds_a, raw_odds_b, schedule
             FROM matches ORDER BY seq",
        )?;
        let matches = stmt
            .query_map([], map_match)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT match_id, odds_a, probability_a, rake_a, odds_b, probability_b, rake_b
             FROM odds_probability ORDER BY seq",
        )?;
        let odds = stmt
            .query_map([], |row| {
                Ok(OddsProbabilityRow {
                    match_id: row.get(0)?,
                    odds_a: quote(row.get(1)?),
                    probability_a: row.get(2)?,
                    rake_a: row.get(3)?,
                    odds_b: quote(row.get(4)?),
                    probability_b: row.get(5)?,
                    rake_b: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT match_id, platform_odds_a, rake_a, platform_odds_b, rake_b
             FROM platform_odds ORDER BY seq",
        )?;
        let platform = stmt
            .query_map([], |row| {
                Ok(PlatformOddsRow {
                    match_id: row.get(0)?,
                    platform_odds_a: quote(row.get(1)?),
                    rake_a: row.get(2)?,
                    platform_odds_b: quote(row.get(3)?),
                    rake_b: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT match_id, expected_profit_a, variance_a, kelly_a,
                    expected_profit_b, variance_b, kelly_b
             FROM expected_profit ORDER BY seq",
        )?;
        let profit = stmt
            .query_map([], |row| {
                Ok(ProfitRow {
                    match_id: row.get(0)?,
                    expected_profit_a: row.get(1)?,
                    variance_a: row.get(2)?,
                    kelly_a: row.get(3)?,
                    expected_profit_b: row.get(4)?,
                    variance_b: row.get(5)?,
                    kelly_b: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT match_id, side, team, stake, result FROM bets ORDER BY seq",
        )?;
        let bets = stmt
            .query_map([], map_bet)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(MatchBook {
            matches: MatchStore { matches },
            metrics: MetricsStore {
                odds,
                platform,
                profit,
            },
            bets,
        })
    }

    fn write_all(tx: &Transaction<'_>, book: &MatchBook) -> Result<()> {
        tx.execute_batch(
            "DELETE FROM matches; DELETE FROM odds_probability; DELETE FROM platform_odds;
             DELETE FROM expected_profit; DELETE FROM bets;",
        )?;

        for (seq, m) in book.matches.matches.iter().enumerate() {
            tx.execute(
                "INSERT INTO matches (
                    match_id, seq, group_name, time_label, team_a, team_b,
                    odds_a, odds_b, raw_odds_a, raw_odds_b, schedule
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
                params![
                    m.match_id,
                    seq as i64,
                    m.group,
                    m.time_label,
                    m.team_a,
                    m.team_b,
                    m.odds_a.value(),
                    m.odds_b.value(),
                    m.raw_odds_a,
                    m.raw_odds_b,
                    m.schedule,
                ],
            )?;
        }
        for (seq, r) in book.metrics.odds.iter().enumerate() {
            tx.execute(
                "INSERT INTO odds_probability (
                    match_id, seq, odds_a, probability_a, rake_a, odds_b, probability_b, rake_b
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
                params![
                    r.match_id,
                    seq as i64,
                    r.odds_a.value(),
                    r.probability_a,
                    r.rake_a,
                    r.odds_b.value(),
                    r.probability_b,
                    r.rake_b,
                ],
            )?;
        }
        for (seq, r) in book.metrics.platform.iter().enumerate() {
            tx.execute(
                "INSERT INTO platform_odds (
                    match_id, seq, platform_odds_a, rake_a, platform_odds_b, rake_b
                 ) VALUES (?1,?2,?3,?4,?5,?6)",
                params![
                    r.match_id,
                    seq as i64,
                    r.platform_odds_a.value(),
                    r.rake_a,
                    r.platform_odds_b.value(),
                    r.rake_b,
                ],
            )?;
        }
        for (seq, r) in book.metrics.profit.iter().enumerate() {
            tx.execute(
                "INSERT INTO expected_profit (
                    match_id, seq, expected_profit_a, variance_a, kelly_a,
                    expected_profit_b, variance_b, kelly_b
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
                params![
                    r.match_id,
                    seq as i64,
                    r.expected_profit_a,
                    r.variance_a,
                    r.kelly_a,
                    r.expected_profit_b,
                    r.variance_b,
                    r.kelly_b,
                ],
            )?;
        }
        for (seq, b) in book.bets.iter().enumerate() {
            tx.execute(
                "INSERT INTO bets (match_id, side, seq, team, stake, result)
                 VALUES (?1,?2,?3,?4,?5,?6)",
                params![
                    b.match_id,
                    b.side.to_string(),
                    seq as i64,
                    b.team,
                    b.stake,
                    b.result.to_string(),
                ],
            )?;
        }
        Ok(())
    }
}

impl StoreBackend for SqliteStore {
    fn load(&self) -> Result<MatchBook> {
        let conn = self.lock()?;
        match Self::read_all(&conn) {
            Ok(book) => {
                debug!(path = %self.path, matches = book.matches.matches.len(), "Store loaded");
                Ok(book)
            }
            Err(e) => {
                warn!(path = %self.path, "Unreadable store, treating as empty: {}", e);
                Ok(MatchBook::default())
            }
        }
    }

    fn commit(&self, book: &MatchBook) -> Result<()> {
        let mut conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)
            .with_context(|| format!("Failed to prepare schema in {}", self.path))?;
        let tx = conn.transaction()?;
        Self::write_all(&tx, book)?;
        tx.commit().with_context(|| format!("Failed to commit {}", self.path))?;
        info!(path = %self.path, matches = book.matches.matches.len(), "Store committed");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn quote(v: Option<f64>) -> OddsQuote {
    OddsQuote::from(v)
}

fn map_match(row: &rusqlite::Row) -> rusqlite::Result<MatchRecord> {
    Ok(MatchRecord {
        match_id: row.get(0)?,
        group: row.get(1)?,
        time_label: row.get(2)?,
        team_a: row.get(3)?,
        team_b: row.get(4)?,
        odds_a: quote(row.get(5)?),
        odds_b: quote(row.get(6)?),
        raw_odds_a: row.get(7)?,
        raw_odds_b: row.get(8)?,
        schedule: row.get(9)?,
    })
}

fn map_bet(row: &rusqlite::Row) -> rusqlite::Result<BetRecord> {
    let side: String = row.get(1)?;
    let result: String = row.get(4)?;
    Ok(BetRecord {
        match_id: row.get(0)?,
        side: side.parse::<Side>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        team: row.get(2)?,
        stake: row.get(3)?,
        result: result.parse::<BetResult>().map_err(|e: anyhow::Error| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
        })?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS matches (
    match_id    TEXT    PRIMARY KEY,
    seq         INTEGER NOT NULL,
    group_name  TEXT    NOT NULL,
    time_label  TEXT    NOT NULL,
    team_a      TEXT    NOT NULL,
    team_b      TEXT,
    odds_a      REAL,
    odds_b      REAL,
    raw_odds_a  TEXT    NOT NULL DEFAULT '',
    raw_odds_b  TEXT    NOT NULL DEFAULT '',
    schedule    TEXT
);

CREATE TABLE IF NOT EXISTS odds_probability (
    match_id      TEXT    PRIMARY KEY,
    seq           INTEGER NOT NULL,
    odds_a        REAL,
    probability_a REAL,
    rake_a        REAL,
    odds_b        REAL,
    probability_b REAL,
    rake_b        REAL
);

CREATE TABLE IF NOT EXISTS platform_odds (
    match_id        TEXT    PRIMARY KEY,
    seq             INTEGER NOT NULL,
    platform_odds_a REAL,
    rake_a          REAL,
    platform_odds_b REAL,
    rake_b          REAL
);

CREATE TABLE IF NOT EXISTS expected_profit (
    match_id          TEXT    PRIMARY KEY,
    seq               INTEGER NOT NULL,
    expected_profit_a REAL,
    variance_a        REAL,
    kelly_a           REAL,
    expected_profit_b REAL,
    variance_b        REAL,
    kelly_b           REAL
);

CREATE TABLE IF NOT EXISTS bets (
    match_id TEXT    NOT NULL,
    side     TEXT    NOT NULL,
    seq      INTEGER NOT NULL,
    team     TEXT    NOT NULL,
    stake    REAL    NOT NULL,
    result   TEXT    NOT NULL DEFAULT 'pending',
    PRIMARY KEY (match_id, side)
);
"#;

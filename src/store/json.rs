//! Directory-of-JSON backend.
//!
//! Layout of a store rooted at `<dir>`:
//!
//! ```text
//! <dir>/matches_info.json              {"matches":  [...]}
//! <dir>/odds_probability.json          {"odds":     [...]}
//! <dir>/platform_odds.json             {"platform": [...]}
//! <dir>/expected_profit_variance.json  {"profit":   [...]}
//! <dir>/bets.json                      {"bets":     [...]}
//! <dir>.lock                           held while committing
//! <dir>.staging/                       next generation being written
//! <dir>.previous/                      last generation, only mid-swap
//! ```
//!
//! A commit writes every table into the staging directory, then swaps it in
//! with two renames. Readers therefore see either the old or the new set of
//! tables, never a mix.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::{MatchBook, MatchStore, MetricsStore, StoreBackend, StoreError};

const MATCHES_FILE: (&str, &str) = ("matches_info.json", "matches");
const ODDS_FILE: (&str, &str) = ("odds_probability.json", "odds");
const PLATFORM_FILE: (&str, &str) = ("platform_odds.json", "platform");
const PROFIT_FILE: (&str, &str) = ("expected_profit_variance.json", "profit");
const BETS_FILE: (&str, &str) = ("bets.json", "bets");

#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name: OsString = self
            .root
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("store"));
        name.push(".");
        name.push(suffix);
        self.root.with_file_name(name)
    }

    fn lock_path(&self) -> PathBuf {
        self.sibling("lock")
    }

    fn staging_dir(&self) -> PathBuf {
        self.sibling("staging")
    }

    fn previous_dir(&self) -> PathBuf {
        self.sibling("previous")
    }
}

impl StoreBackend for JsonDirStore {
    fn load(&self) -> Result<MatchBook> {
        let dir = if self.root.is_dir() {
            self.root.clone()
        } else if self.previous_dir().is_dir() {
            // Crashed between moving the live copy aside and renaming staging in.
            warn!(path = %self.previous_dir().display(), "Live store missing, recovering previous generation");
            self.previous_dir()
        } else {
            info!(path = %self.root.display(), "No store found, starting empty");
            return Ok(MatchBook::default());
        };

        let book = MatchBook {
            matches: MatchStore {
                matches: read_table(&dir, MATCHES_FILE),
            },
            metrics: MetricsStore {
                odds: read_table(&dir, ODDS_FILE),
                platform: read_table(&dir, PLATFORM_FILE),
                profit: read_table(&dir, PROFIT_FILE),
            },
            bets: read_table(&dir, BETS_FILE),
        };
        debug!(
            path = %dir.display(),
            matches = book.matches.matches.len(),
            bets = book.bets.len(),
            "Store loaded"
        );
        Ok(book)
    }

    fn commit(&self, book: &MatchBook) -> Result<()> {
        if let Some(parent) = self.root.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let _lock = StoreLock::acquire(self.lock_path())?;

        let staging = self.staging_dir();
        if staging.exists() {
            fs::remove_dir_all(&staging)
                .with_context(|| format!("Failed to clear stale {}", staging.display()))?;
        }
        fs::create_dir_all(&staging)
            .with_context(|| format!("Failed to create {}", staging.display()))?;

        write_table(&staging, MATCHES_FILE, &book.matches.matches)?;
        write_table(&staging, ODDS_FILE, &book.metrics.odds)?;
        write_table(&staging, PLATFORM_FILE, &book.metrics.platform)?;
        write_table(&staging, PROFIT_FILE, &book.metrics.profit)?;
        write_table(&staging, BETS_FILE, &book.bets)?;

        let previous = self.previous_dir();
        if self.root.exists() {
            // The live copy is complete, so any previous generation is stale.
            if previous.exists() {
                fs::remove_dir_all(&previous)
                    .with_context(|| format!("Failed to clear {}", previous.display()))?;
            }
            fs::rename(&self.root, &previous)
                .with_context(|| format!("Failed to move {} aside", self.root.display()))?;
        } else if previous.exists() {
            // Interrupted swap: previous is the last committed copy and stays
            // until staging is in place.
            warn!(path = %previous.display(), "Committing over previous generation from interrupted commit");
        }
        if let Err(err) = fs::rename(&staging, &self.root) {
            if previous.exists() {
                if let Err(e) = fs::rename(&previous, &self.root) {
                    error!(path = %previous.display(), "Failed to restore previous generation: {}", e);
                }
            }
            return Err(err).with_context(|| format!("Failed to install {}", self.root.display()));
        }
        if previous.exists() {
            if let Err(e) = fs::remove_dir_all(&previous) {
                warn!("Failed to remove {}: {}", previous.display(), e);
            }
        }

        info!(
            path = %self.root.display(),
            matches = book.matches.matches.len(),
            "Store committed"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.root.display())
    }
}

/// Exclusive writer lock; released on drop.
struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(StoreLock { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::Locked(path.display().to_string()).into())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to create lock {}", path.display())),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

/// Read one table; a missing or unreadable file yields an empty table.
fn read_table<T: DeserializeOwned>(dir: &Path, (file, key): (&str, &str)) -> Vec<T> {
    let path = dir.join(file);
    let text = match fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Table file missing, treating as empty");
            return Vec::new();
        }
        Err(e) => {
            warn!(path = %path.display(), "Failed to read table, treating as empty: {}", e);
            return Vec::new();
        }
    };

    let parsed = serde_json::from_str::<Value>(&text)
        .map_err(anyhow::Error::from)
        .and_then(|mut v| {
            let rows = v
                .get_mut(key)
                .map(Value::take)
                .with_context(|| format!("missing top-level key '{key}'"))?;
            Ok(serde_json::from_value::<Vec<T>>(rows)?)
        });
    match parsed {
        Ok(rows) => rows,
        Err(e) => {
            warn!(path = %path.display(), "Corrupt table, treating as empty: {:#}", e);
            Vec::new()
        }
    }
}

fn write_table<T: Serialize>(dir: &Path, (file, key): (&str, &str), rows: &[T]) -> Result<()> {
    let path = dir.join(file);
    let mut doc = Map::new();
    doc.insert(key.to_string(), serde_json::to_value(rows)?);
    let payload = serde_json::to_vec_pretty(&Value::Object(doc))
        .with_context(|| format!("Failed to serialise {file}"))?;

    let mut out = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    out.write_all(&payload)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    out.sync_all()
        .with_context(|| format!("Failed to sync {}", path.display()))?;
    Ok(())
}

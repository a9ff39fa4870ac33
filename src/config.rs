use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};

use crate::analytics::allocation::{AllocationConfig, DEFAULT_EPSILON, DEFAULT_PER_ITEM_CAP};
use crate::analytics::odds::OddsConfig;
use crate::reconcile::time_label::TimeLabelParser;
use crate::reconcile::ReconcileConfig;
use crate::store::{JsonDirStore, SqliteStore, StoreBackend};

/// Two-outcome odds ledger: fair probability, platform rake, Kelly sizing
#[derive(Parser, Debug, Clone)]
#[command(name = "oddsledger", version, about)]
pub struct Config {
    /// Directory holding one store per match group
    #[arg(long, env = "ODDSLEDGER_DATA_DIR", default_value = "match_data")]
    pub data_dir: PathBuf,

    /// Match group (tournament) the command operates on
    #[arg(long, env = "ODDSLEDGER_GROUP", default_value = "default")]
    pub group: String,

    /// Persistence backend
    #[arg(long, env = "ODDSLEDGER_BACKEND", value_enum, default_value = "json")]
    pub backend: Backend,

    /// Total odds assumed for the pick'em token
    #[arg(long, env = "PICKEM_IMPLIED_ODDS", default_value = "1.04")]
    pub pickem_odds: f64,

    /// Token the feed uses for a pick'em quote
    #[arg(long, default_value = "-")]
    pub pickem_token: String,

    /// Total odds assumed for the no-line token
    #[arg(long, default_value = "25.0")]
    pub no_line_odds: f64,

    /// Token the feed uses when no line is offered
    #[arg(long, default_value = "25")]
    pub no_line_token: String,

    /// Two time labels within this many hours denote the same match
    #[arg(long, env = "CLOSE_MATCH_HOURS", default_value = "3")]
    pub close_match_hours: i64,

    /// Hard ceiling on a single stake
    #[arg(long, env = "PER_ITEM_CAP", default_value_t = DEFAULT_PER_ITEM_CAP)]
    pub per_item_cap: f64,

    /// Remainder below this is considered fully allocated
    #[arg(long, default_value_t = DEFAULT_EPSILON)]
    pub allocation_epsilon: f64,

    /// Time label used when the kickoff time is not known yet
    #[arg(long, default_value = "unknown")]
    pub unknown_time_label: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Json,
    Sqlite,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Reconcile a multi-match CSV feed (time,team_a,odds_a,team_b,odds_b[,annotation])
    Ingest { feed: PathBuf },

    /// Reconcile a single-team CSV feed (Team,Odds), paired two rows at a time
    IngestLegacy { feed: PathBuf },

    /// Enter the platform net odds for one side of a match
    SetOdds {
        match_id: String,
        side: String,
        odds: String,
    },

    /// Show per-side metrics for every match in the group
    Report {
        #[arg(long)]
        json: bool,
    },

    /// Split a bankroll over positive-Kelly sides
    Allocate {
        bankroll: f64,
        #[arg(long)]
        json: bool,
    },

    /// Record a stake on one side
    Bet {
        match_id: String,
        side: String,
        stake: f64,
    },

    /// Settle a recorded stake
    Settle {
        match_id: String,
        side: String,
        result: String,
    },

    /// Profit summary of the bet ledger
    Stats {
        /// Recent window, in days before today
        #[arg(long, default_value = "3")]
        days: i64,
        #[arg(long)]
        json: bool,
    },
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.group.trim().is_empty() {
            anyhow::bail!("group must not be empty");
        }
        if self.group.contains(['/', '\\']) || self.group.starts_with('.') {
            anyhow::bail!("group must be a plain name, got '{}'", self.group);
        }
        if !(self.pickem_odds.is_finite() && self.pickem_odds > 0.0) {
            anyhow::bail!("pickem_odds must be positive");
        }
        if !(self.no_line_odds.is_finite() && self.no_line_odds > 0.0) {
            anyhow::bail!("no_line_odds must be positive");
        }
        if self.close_match_hours <= 0 {
            anyhow::bail!("close_match_hours must be positive");
        }
        if !(self.per_item_cap > 0.0) {
            anyhow::bail!("per_item_cap must be positive");
        }
        if !(self.allocation_epsilon > 0.0) {
            anyhow::bail!("allocation_epsilon must be positive");
        }
        match &self.command {
            Command::Allocate { bankroll, .. } if !(*bankroll >= 0.0) => {
                anyhow::bail!("bankroll must not be negative")
            }
            Command::Bet { stake, .. } if !(*stake > 0.0) => {
                anyhow::bail!("stake must be positive")
            }
            Command::Stats { days, .. } if *days < 0 => {
                anyhow::bail!("days must not be negative")
            }
            _ => {}
        }
        Ok(())
    }

    pub fn odds_config(&self) -> OddsConfig {
        OddsConfig {
            pickem_token: self.pickem_token.clone(),
            pickem_odds: self.pickem_odds,
            no_line_token: self.no_line_token.clone(),
            no_line_odds: self.no_line_odds,
        }
    }

    pub fn allocation_config(&self) -> AllocationConfig {
        AllocationConfig {
            per_item_cap: self.per_item_cap,
            epsilon: self.allocation_epsilon,
        }
    }

    /// Time labels are anchored on the local date.
    pub fn time_parser(&self) -> TimeLabelParser {
        TimeLabelParser::new(self.unknown_time_label.clone(), Local::now().date_naive())
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            odds: self.odds_config(),
            times: self.time_parser(),
            close_threshold: chrono::Duration::hours(self.close_match_hours),
        }
    }

    /// `<data_dir>/<group>/` for JSON, `<data_dir>/<group>.db` for SQLite.
    pub fn open_store(&self) -> Result<Box<dyn StoreBackend>> {
        match self.backend {
            Backend::Json => Ok(Box::new(JsonDirStore::new(self.data_dir.join(&self.group)))),
            Backend::Sqlite => {
                std::fs::create_dir_all(&self.data_dir)?;
                let path = self.data_dir.join(format!("{}.db", self.group));
                Ok(Box::new(SqliteStore::open(&path.to_string_lossy())?))
            }
        }
    }
}

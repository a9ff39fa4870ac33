use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analytics::odds::{na, OddsQuote};
use crate::analytics::settlement::BetResult;

/// Which of the two teams of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "TeamA")]
    A,
    #[serde(rename = "TeamB")]
    B,
}

impl FromStr for Side {
    type Err = crate::store::StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a" | "teama" => Ok(Side::A),
            "b" | "teamb" => Ok(Side::B),
            _ => Err(crate::store::StoreError::InvalidSide(s.to_string())),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::A => "TeamA",
            Side::B => "TeamB",
        })
    }
}

/// Join key of a match across every table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchIdentity {
    pub group: String,
    pub time_label: String,
    pub team_a: String,
    /// `None` only for one-sided placeholders from the single-team feed.
    pub team_b: Option<String>,
}

impl MatchIdentity {
    /// Same group and team pair, any time.
    pub fn same_fixture(&self, other: &MatchIdentity) -> bool {
        self.group == other.group && self.team_a == other.team_a && self.team_b == other.team_b
    }
}

/// One row of the primary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(rename = "MatchID")]
    pub match_id: String,
    #[serde(rename = "MatchName")]
    pub group: String,
    #[serde(rename = "MatchTime")]
    pub time_label: String,
    #[serde(rename = "TeamA")]
    pub team_a: String,
    #[serde(rename = "TeamB")]
    pub team_b: Option<String>,
    #[serde(rename = "TeamA_Odds")]
    pub odds_a: OddsQuote,
    #[serde(rename = "TeamB_Odds")]
    pub odds_b: OddsQuote,
    /// Token exactly as scraped, kept for display.
    #[serde(rename = "TeamA_RawOdds", default)]
    pub raw_odds_a: String,
    #[serde(rename = "TeamB_RawOdds", default)]
    pub raw_odds_b: String,
    #[serde(rename = "Schedule", default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

impl MatchRecord {
    pub fn identity(&self) -> MatchIdentity {
        MatchIdentity {
            group: self.group.clone(),
            time_label: self.time_label.clone(),
            team_a: self.team_a.clone(),
            team_b: self.team_b.clone(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.team_b.is_none()
    }

    pub fn team(&self, side: Side) -> Option<&str> {
        match side {
            Side::A => Some(self.team_a.as_str()),
            Side::B => self.team_b.as_deref(),
        }
    }

    pub fn odds(&self, side: Side) -> OddsQuote {
        match side {
            Side::A => self.odds_a,
            Side::B => self.odds_b,
        }
    }

    pub fn raw_odds(&self, side: Side) -> &str {
        match side {
            Side::A => &self.raw_odds_a,
            Side::B => &self.raw_odds_b,
        }
    }
}

/// Reference odds with fair probability and rake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsProbabilityRow {
    #[serde(rename = "MatchID")]
    pub match_id: String,
    #[serde(rename = "TeamA_Odds")]
    pub odds_a: OddsQuote,
    #[serde(rename = "TeamA_Probability", with = "na")]
    pub probability_a: Option<f64>,
    #[serde(rename = "TeamA_PlatformRake", with = "na")]
    pub rake_a: Option<f64>,
    #[serde(rename = "TeamB_Odds")]
    pub odds_b: OddsQuote,
    #[serde(rename = "TeamB_Probability", with = "na")]
    pub probability_b: Option<f64>,
    #[serde(rename = "TeamB_PlatformRake", with = "na")]
    pub rake_b: Option<f64>,
}

impl OddsProbabilityRow {
    pub fn empty(match_id: &str) -> Self {
        Self {
            match_id: match_id.to_string(),
            odds_a: OddsQuote::Unavailable,
            probability_a: None,
            rake_a: None,
            odds_b: OddsQuote::Unavailable,
            probability_b: None,
            rake_b: None,
        }
    }
}

/// Platform odds entered per side, with rake duplicated for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformOddsRow {
    #[serde(rename = "MatchID")]
    pub match_id: String,
    #[serde(rename = "TeamA_PlatformOdds")]
    pub platform_odds_a: OddsQuote,
    #[serde(rename = "TeamA_PlatformRake", with = "na")]
    pub rake_a: Option<f64>,
    #[serde(rename = "TeamB_PlatformOdds")]
    pub platform_odds_b: OddsQuote,
    #[serde(rename = "TeamB_PlatformRake", with = "na")]
    pub rake_b: Option<f64>,
}

impl PlatformOddsRow {
    pub fn empty(match_id: &str) -> Self {
        Self {
            match_id: match_id.to_string(),
            platform_odds_a: OddsQuote::Unavailable,
            rake_a: None,
            platform_odds_b: OddsQuote::Unavailable,
            rake_b: None,
        }
    }

    pub fn odds(&self, side: Side) -> OddsQuote {
        match side {
            Side::A => self.platform_odds_a,
            Side::B => self.platform_odds_b,
        }
    }
}

/// Expected profit, variance and Kelly per side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitRow {
    #[serde(rename = "MatchID")]
    pub match_id: String,
    #[serde(rename = "TeamA_Expected_Profit", with = "na")]
    pub expected_profit_a: Option<f64>,
    #[serde(rename = "TeamA_ProfitVariance", with = "na")]
    pub variance_a: Option<f64>,
    #[serde(rename = "TeamA_Kelly", with = "na")]
    pub kelly_a: Option<f64>,
    #[serde(rename = "TeamB_Expected_Profit", with = "na")]
    pub expected_profit_b: Option<f64>,
    #[serde(rename = "TeamB_ProfitVariance", with = "na")]
    pub variance_b: Option<f64>,
    #[serde(rename = "TeamB_Kelly", with = "na")]
    pub kelly_b: Option<f64>,
}

impl ProfitRow {
    pub fn empty(match_id: &str) -> Self {
        Self {
            match_id: match_id.to_string(),
            expected_profit_a: None,
            variance_a: None,
            kelly_a: None,
            expected_profit_b: None,
            variance_b: None,
            kelly_b: None,
        }
    }
}

/// A stake placed on one side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    #[serde(rename = "MatchID")]
    pub match_id: String,
    #[serde(rename = "Side")]
    pub side: Side,
    #[serde(rename = "Team")]
    pub team: String,
    #[serde(rename = "Coins")]
    pub stake: f64,
    #[serde(rename = "Result")]
    pub result: BetResult,
}

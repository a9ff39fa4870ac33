//! Raw odds token normalisation.
//!
//! Feeds hand us odds as display strings. Most are plain decimals ("1.85"),
//! but bookmakers also show two sentinels:
//!   - a no-line marker for a side so heavily favoured that no price is
//!     offered, mapped to a fixed long price
//!   - a pick'em marker ("-"), mapped to a fixed near-even price
//!
//! Everything else that fails to parse as a positive finite decimal becomes
//! [`OddsQuote::Unavailable`]; callers never see a parse error.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Literal written for any value that could not be produced.
pub const NOT_AVAILABLE: &str = "N/A";

/// Default near-even price for the pick'em sentinel.
///
/// Two call sites upstream used 1.04 and 1.0417 for the same marker; one
/// configurable value replaces both.
pub const PICKEM_IMPLIED_ODDS: f64 = 1.04;

/// Default price for the no-line sentinel.
pub const NO_LINE_ODDS: f64 = 25.0;

/// A normalised decimal odds value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OddsQuote {
    Value(f64),
    Unavailable,
}

impl OddsQuote {
    pub fn value(self) -> Option<f64> {
        match self {
            OddsQuote::Value(v) => Some(v),
            OddsQuote::Unavailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, OddsQuote::Value(_))
    }
}

impl From<Option<f64>> for OddsQuote {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(v) => OddsQuote::Value(v),
            None => OddsQuote::Unavailable,
        }
    }
}

impl Serialize for OddsQuote {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        na::serialize(&self.value(), serializer)
    }
}

impl<'de> Deserialize<'de> for OddsQuote {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        na::deserialize(deserializer).map(OddsQuote::from)
    }
}

/// Sentinel handling for odds tokens.
#[derive(Debug, Clone)]
pub struct OddsConfig {
    pub pickem_token: String,
    pub pickem_odds: f64,
    pub no_line_token: String,
    pub no_line_odds: f64,
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            pickem_token: "-".to_string(),
            pickem_odds: PICKEM_IMPLIED_ODDS,
            no_line_token: "25".to_string(),
            no_line_odds: NO_LINE_ODDS,
        }
    }
}

impl OddsConfig {
    /// Map a raw token to a quote. Whitespace is ignored.
    pub fn parse(&self, token: &str) -> OddsQuote {
        let token = token.trim();
        if token.is_empty() || token.eq_ignore_ascii_case(NOT_AVAILABLE) {
            return OddsQuote::Unavailable;
        }
        if token == self.no_line_token {
            return OddsQuote::Value(self.no_line_odds);
        }
        if token == self.pickem_token {
            return OddsQuote::Value(self.pickem_odds);
        }
        match token.parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => OddsQuote::Value(v),
            _ => OddsQuote::Unavailable,
        }
    }
}

/// Render an optional number with the given precision, or `N/A`.
pub fn fmt_or_na(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Serde adapter persisting `Option<f64>` as a number or the `"N/A"` literal.
pub mod na {
    use super::NOT_AVAILABLE;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
        Null(()),
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_f64(*v),
            None => serializer.serialize_str(NOT_AVAILABLE),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Num(v) if v.is_finite() => Some(v),
            Raw::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        })
    }
}

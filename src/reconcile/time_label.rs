//! Scheduled-time labels as scraped from match lists.
//!
//! Accepted shapes (case-insensitive, commas ignored):
//!   - `03-03 18:00`        month-day numeric
//!   - `Mar 3 18:00`        month-day textual (full month names too)
//!   - `today 18:00`, `tomorrow 18:00`
//!
//! Labels carry no year; the year closest to the reference date is chosen.
//! Anything else, including the configured unknown sentinel, parses to
//! `None`.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

pub const DEFAULT_UNKNOWN_LABEL: &str = "unknown";

#[derive(Debug, Clone)]
pub struct TimeLabelParser {
    pub unknown_label: String,
    /// Anchor for relative words and the missing year.
    pub today: NaiveDate,
}

impl TimeLabelParser {
    pub fn new(unknown_label: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            unknown_label: unknown_label.into(),
            today,
        }
    }

    pub fn is_unknown(&self, label: &str) -> bool {
        let label = label.trim();
        label.is_empty() || label.eq_ignore_ascii_case(&self.unknown_label)
    }

    pub fn parse(&self, label: &str) -> Option<NaiveDateTime> {
        if self.is_unknown(label) {
            return None;
        }
        let cleaned = label.replace(',', " ");
        let mut parts = cleaned.split_whitespace();
        let first = parts.next()?;
        let rest: Vec<&str> = parts.collect();

        let (date_text, time_text) = match rest.as_slice() {
            [time] => (first.to_string(), *time),
            // Textual month followed by day
            [day, time] => (format!("{first} {day}"), *time),
            _ => return None,
        };
        let time = NaiveTime::parse_from_str(time_text, "%H:%M").ok()?;

        let date = match date_text.to_lowercase().as_str() {
            "today" => Some(self.today),
            "tomorrow" => self.today.succ_opt(),
            "yesterday" => self.today.pred_opt(),
            _ => self.month_day(&date_text),
        }?;
        Some(date.and_time(time))
    }

    /// Absolute distance between two kickoffs, `None` unless both parse.
    pub fn gap(&self, a: &str, b: &str) -> Option<Duration> {
        let (a, b) = (self.parse(a)?, self.parse(b)?);
        Some(Duration::seconds((a - b).num_seconds().abs()))
    }

    /// Rewrite a relative label (`today 18:00`) as `MM-DD HH:MM` so a stored
    /// label keeps meaning the same day. Other labels are returned trimmed.
    pub fn normalize(&self, label: &str) -> String {
        let label = label.trim();
        let relative = label
            .split_whitespace()
            .next()
            .map(str::to_lowercase)
            .is_some_and(|w| matches!(w.as_str(), "today" | "tomorrow" | "yesterday"));
        match self.parse(label) {
            Some(kickoff) if relative => kickoff.format("%m-%d %H:%M").to_string(),
            _ => label.to_string(),
        }
    }

    fn month_day(&self, text: &str) -> Option<NaiveDate> {
        let year = self.today.year();
        [year - 1, year, year + 1]
            .into_iter()
            .filter_map(|y| {
                let with_year = format!("{y} {text}");
                NaiveDate::parse_from_str(&with_year, "%Y %m-%d")
                    .or_else(|_| NaiveDate::parse_from_str(&with_year, "%Y %B %d"))
                    .ok()
            })
            .min_by_key(|d| (*d - self.today).num_days().abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn parser() -> TimeLabelParser {
        TimeLabelParser::new(DEFAULT_UNKNOWN_LABEL, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap())
    }

    #[test]
    fn test_numeric_month_day() {
        let dt = parser().parse("03-03 18:00").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(dt.hour(), 18);
    }

    #[test]
    fn test_textual_month_day() {
        let p = parser();
        assert_eq!(p.parse("Mar 3 18:00"), p.parse("03-03 18:00"));
        assert_eq!(p.parse("March 3, 18:00"), p.parse("03-03 18:00"));
    }

    #[test]
    fn test_relative_days() {
        let p = parser();
        assert_eq!(p.parse("today 09:30").unwrap().date(), p.today);
        assert_eq!(
            p.parse("Tomorrow 09:30").unwrap().date(),
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
        );
    }

    #[test]
    fn test_year_closest_to_reference() {
        let p = TimeLabelParser::new("unknown", NaiveDate::from_ymd_opt(2025, 12, 30).unwrap());
        assert_eq!(p.parse("01-02 10:00").unwrap().year(), 2026);
    }

    #[test]
    fn test_unparseable_is_none() {
        let p = parser();
        for label in ["unknown", "", "Live", "03-03", "13-40 18:00", "03-03 25:00", "soon-ish 10:00"] {
            assert_eq!(p.parse(label), None, "label {label:?}");
        }
    }

    #[test]
    fn test_gap_between_labels() {
        let p = parser();
        assert_eq!(p.gap("03-03 18:00", "03-03 21:00"), Some(Duration::hours(3)));
        assert_eq!(p.gap("03-04 01:00", "03-03 23:30"), Some(Duration::minutes(90)));
        assert_eq!(p.gap("unknown", "03-03 18:00"), None);
    }

    #[test]
    fn test_normalize_pins_relative_days() {
        let p = parser();
        assert_eq!(p.normalize("today 18:00"), "03-02 18:00");
        assert_eq!(p.normalize(" Tomorrow 09:05 "), "03-03 09:05");
        assert_eq!(p.normalize("yesterday 23:00"), "03-01 23:00");
        assert_eq!(p.normalize("Mar 3 18:00"), "Mar 3 18:00");
        assert_eq!(p.normalize("unknown"), "unknown");
        assert_eq!(p.normalize("today"), "today");

        let next_day = TimeLabelParser::new("unknown", NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(next_day.parse(&p.normalize("today 18:00")), p.parse("today 18:00"));
    }
}

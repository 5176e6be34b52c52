use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ConfigError;

/// First month of the fiscal year (July).
pub const FISCAL_YEAR_START_MONTH: u32 = 7;

/// Inclusive `[start, end]` reporting period.
#[derive(Debug, Clone, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct DateWindow {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

// Create
impl DateWindow {
    pub fn new(
        label: impl ToString,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidWindow { start, end });
        }
        Ok(Self {
            label: label.to_string(),
            start,
            end,
        })
    }

    /// A merge timestamp falls inside the window when its UTC date does.
    pub fn contains(&self, datetime: &DateTime<Utc>) -> bool {
        let date = datetime.date_naive();
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Computes the reporting window. The default is the fiscal year that
/// contains `today` (July 1 to June 30, named after the year it ends in);
/// explicit bounds override either side independently.
pub struct DateWindowResolver;

impl DateWindowResolver {
    pub fn resolve(
        today: NaiveDate,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<DateWindow, ConfigError> {
        let fiscal = Self::fiscal_year(today);
        match (start, end) {
            (None, None) => Ok(fiscal),
            (start, end) => DateWindow::new(
                "custom",
                start.unwrap_or(fiscal.start),
                end.unwrap_or(fiscal.end),
            ),
        }
    }

    pub fn resolve_now(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<DateWindow, ConfigError> {
        Self::resolve(Local::now().date_naive(), start, end)
    }

    pub fn fiscal_year(today: NaiveDate) -> DateWindow {
        let end_year = if today.month() >= FISCAL_YEAR_START_MONTH {
            today.year() + 1
        } else {
            today.year()
        };
        // July 1st and June 30th exist in every year.
        let start = NaiveDate::from_ymd_opt(end_year - 1, FISCAL_YEAR_START_MONTH, 1)
            .unwrap_or(NaiveDate::MIN);
        let end = NaiveDate::from_ymd_opt(end_year, 6, 30).unwrap_or(NaiveDate::MAX);
        DateWindow {
            label: format!("FY{:02}", end_year.rem_euclid(100)),
            start,
            end,
        }
    }
}

// Parser
pub fn parse_date(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ConfigError::InvalidDate(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn july_starts_the_next_fiscal_year() {
        let window = DateWindowResolver::resolve(date(2025, 7, 1), None, None).unwrap();
        assert_eq!(window.label, "FY26");
        assert_eq!(window.start, date(2025, 7, 1));
        assert_eq!(window.end, date(2026, 6, 30));
    }

    #[test]
    fn june_belongs_to_the_current_fiscal_year() {
        let window = DateWindowResolver::resolve(date(2026, 6, 30), None, None).unwrap();
        assert_eq!(window.label, "FY26");
        assert_eq!(window.start, date(2025, 7, 1));
        assert_eq!(window.end, date(2026, 6, 30));
    }

    #[test]
    fn overrides_replace_each_bound_independently() {
        let today = date(2025, 10, 16);
        let window =
            DateWindowResolver::resolve(today, Some(date(2025, 1, 1)), None).unwrap();
        assert_eq!(window.label, "custom");
        assert_eq!(window.start, date(2025, 1, 1));
        assert_eq!(window.end, date(2026, 6, 30));

        let window =
            DateWindowResolver::resolve(today, None, Some(date(2025, 9, 30))).unwrap();
        assert_eq!(window.start, date(2025, 7, 1));
        assert_eq!(window.end, date(2025, 9, 30));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let result = DateWindowResolver::resolve(
            date(2025, 10, 16),
            Some(date(2025, 12, 31)),
            Some(date(2025, 1, 1)),
        );
        assert!(matches!(result, Err(ConfigError::InvalidWindow { .. })));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = DateWindow::new("custom", date(2025, 1, 1), date(2025, 1, 31)).unwrap();
        assert!(window.contains(&Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
        assert!(window.contains(&Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 59).unwrap()));
        assert!(!window.contains(&Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()));
        assert!(!window.contains(&Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap()));
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(parse_date("2025-07-01").unwrap(), date(2025, 7, 1));
        assert!(parse_date("07/01/2025").is_err());
    }
}

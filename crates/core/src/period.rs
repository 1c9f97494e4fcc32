use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid year-month '{0}', expected YYYY-MM")]
pub struct YearMonthError(pub String);

/// Calendar month bucket used for reporting (`2025-08`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| YearMonth { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = YearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || YearMonthError(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(err)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(err());
        }
        let year = y.parse::<i32>().map_err(|_| err())?;
        let month = m.parse::<u32>().map_err(|_| err())?;
        YearMonth::new(year, month).ok_or_else(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(YearMonth::from_date(date(2025, 3, 9)).to_string(), "2025-03");
    }

    #[test]
    fn parse_valid_and_invalid() {
        let ym: YearMonth = "2025-08".parse().unwrap();
        assert_eq!((ym.year(), ym.month()), (2025, 8));
        assert!("2025-13".parse::<YearMonth>().is_err());
        assert!("2025-8".parse::<YearMonth>().is_err());
        assert!("August".parse::<YearMonth>().is_err());
    }

    #[test]
    fn contains_only_its_month() {
        let ym = YearMonth::new(2024, 2).unwrap();
        assert!(ym.contains(date(2024, 2, 29)));
        assert!(!ym.contains(date(2024, 3, 1)));
        assert!(!ym.contains(date(2023, 2, 1)));
    }

    #[test]
    fn ordering_is_chronological() {
        assert!(YearMonth::new(2024, 12).unwrap() < YearMonth::new(2025, 1).unwrap());
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::category::Category;
use super::money::Money;
use super::period::YearMonth;

/// Where a transaction's category came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Rule,
    Manual,
    #[default]
    Unset,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Rule => write!(f, "rule"),
            Provenance::Manual => write!(f, "manual"),
            Provenance::Unset => write!(f, "unset"),
        }
    }
}

impl FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rule" => Ok(Provenance::Rule),
            "manual" => Ok(Provenance::Manual),
            "unset" => Ok(Provenance::Unset),
            other => Err(format!("Unknown provenance: '{other}'")),
        }
    }
}

/// A card transaction as handed over by the CSV importers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub raw_description: String,
    /// Positive is spend, negative is a payment or refund.
    pub amount: Money,
    pub category: Option<Category>,
    pub provenance: Provenance,
}

impl Transaction {
    pub fn new(date: NaiveDate, raw_description: impl Into<String>, amount: Money) -> Self {
        Transaction {
            date,
            raw_description: raw_description.into(),
            amount,
            category: None,
            provenance: Provenance::Unset,
        }
    }

    pub fn year_month(&self) -> YearMonth {
        YearMonth::from_date(self.date)
    }

    pub fn is_categorized(&self) -> bool {
        self.category.is_some()
    }

    pub fn categorized(mut self, category: Category, provenance: Provenance) -> Self {
        self.category = Some(category);
        self.provenance = provenance;
        self
    }

    pub fn unresolved(mut self) -> Self {
        self.category = None;
        self.provenance = Provenance::Unset;
        self
    }
}

/// Output record of a categorization batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedTransaction {
    pub transaction: Transaction,
    /// Normalized merchant key the decision was made on.
    pub merchant: String,
    /// Keyword that matched or was just learned, if any.
    pub keyword: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn new_transaction_is_unset() {
        let tx = Transaction::new(date(2025, 1, 15), "STARBUCKS", Money::from_cents(845));
        assert_eq!(tx.category, None);
        assert_eq!(tx.provenance, Provenance::Unset);
        assert!(!tx.is_categorized());
        assert_eq!(tx.year_month().to_string(), "2025-01");
    }

    #[test]
    fn categorized_sets_both_fields() {
        let tx = Transaction::new(date(2025, 1, 15), "STARBUCKS", Money::from_cents(845))
            .categorized(Category::Food, Provenance::Manual);
        assert_eq!(tx.category, Some(Category::Food));
        assert_eq!(tx.provenance, Provenance::Manual);

        let tx = tx.unresolved();
        assert_eq!(tx.category, None);
        assert_eq!(tx.provenance, Provenance::Unset);
    }

    #[test]
    fn provenance_text_round_trip() {
        for p in [Provenance::Rule, Provenance::Manual, Provenance::Unset] {
            assert_eq!(p.to_string().parse::<Provenance>().unwrap(), p);
        }
        assert!("auto".parse::<Provenance>().is_err());
    }

    #[test]
    fn provenance_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Provenance::Manual).unwrap(), "\"manual\"");
    }
}

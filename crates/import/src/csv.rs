use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spendsort_core::{Money, Transaction};
use std::io::Read;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AmountColumns {
    Single { column: String },
    /// Both columns are summed; the credit column already carries its sign.
    DebitCredit { debit: String, credit: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvImportProfile {
    pub name: String,
    pub date_column: String,
    pub description_column: String,
    pub amount: AmountColumns,
    #[serde(default)]
    pub negate_amount: bool,
    /// Rows whose description contains any of these (case-insensitive) are dropped.
    #[serde(default)]
    pub skip_patterns: Vec<String>,
    #[serde(default)]
    pub description_prefix: Option<String>,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl CsvImportProfile {
    pub fn citi() -> Self {
        Self {
            name: "Citi".to_string(),
            date_column: "Date".to_string(),
            description_column: "Description".to_string(),
            amount: AmountColumns::DebitCredit {
                debit: "Debit".to_string(),
                credit: "Credit".to_string(),
            },
            negate_amount: false,
            skip_patterns: vec!["costco".to_string()],
            description_prefix: None,
            date_format: "%m/%d/%Y".to_string(),
            delimiter: default_delimiter(),
        }
    }

    pub fn smartly() -> Self {
        Self {
            name: "Smartly".to_string(),
            date_column: "Date".to_string(),
            description_column: "Name".to_string(),
            amount: AmountColumns::Single {
                column: "Amount".to_string(),
            },
            negate_amount: true,
            skip_patterns: vec!["costco".to_string()],
            description_prefix: None,
            date_format: "%m/%d/%Y".to_string(),
            delimiter: default_delimiter(),
        }
    }

    pub fn costco() -> Self {
        Self {
            name: "Costco".to_string(),
            date_column: "date".to_string(),
            description_column: "description".to_string(),
            amount: AmountColumns::Single {
                column: "amount".to_string(),
            },
            negate_amount: false,
            skip_patterns: Vec::new(),
            description_prefix: Some("COSTCO-".to_string()),
            date_format: default_date_format(),
            delimiter: default_delimiter(),
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "citi" => Some(Self::citi()),
            "smartly" => Some(Self::smartly()),
            "costco" => Some(Self::costco()),
            _ => None,
        }
    }

    fn should_skip(&self, description: &str) -> bool {
        let desc = description.to_lowercase();
        self.skip_patterns
            .iter()
            .any(|p| desc.contains(&p.to_lowercase()))
    }
}

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Invalid date format: {0}")]
    InvalidDate(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("No data rows")]
    NoDataRows,
}

enum AmountIndex {
    Single(usize),
    DebitCredit(usize, usize),
}

struct ColumnIndex {
    date: usize,
    description: usize,
    amount: AmountIndex,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, profile: &CsvImportProfile) -> Result<Self, CsvError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| CsvError::MissingColumn(name.to_string()))
        };
        let amount = match &profile.amount {
            AmountColumns::Single { column } => AmountIndex::Single(find(column)?),
            AmountColumns::DebitCredit { debit, credit } => {
                AmountIndex::DebitCredit(find(debit)?, find(credit)?)
            }
        };
        Ok(Self {
            date: find(&profile.date_column)?,
            description: find(&profile.description_column)?,
            amount,
        })
    }
}

pub struct CsvImporter;

impl CsvImporter {
    pub fn parse_profile<R: Read>(
        reader: &mut csv::Reader<R>,
        profile: &CsvImportProfile,
    ) -> Result<Vec<Transaction>, CsvError> {
        let headers = reader.headers()?.clone();
        let columns = ColumnIndex::resolve(&headers, profile)?;
        let mut transactions = Vec::new();

        for result in reader.records() {
            let record = result?;

            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }

            let description = record
                .get(columns.description)
                .unwrap_or_default()
                .trim()
                .to_string();

            if profile.should_skip(&description) {
                continue;
            }

            let date = parse_date(
                record.get(columns.date).unwrap_or_default(),
                &profile.date_format,
            )?;

            let mut amount = match columns.amount {
                AmountIndex::Single(col) => parse_amount(record.get(col).unwrap_or_default())?,
                AmountIndex::DebitCredit(d_col, c_col) => {
                    let d = optional_amount(record.get(d_col))?;
                    let c = optional_amount(record.get(c_col))?;
                    d.unwrap_or_default() + c.unwrap_or_default()
                }
            };
            if profile.negate_amount {
                amount = -amount;
            }

            let description = match &profile.description_prefix {
                Some(prefix) => format!("{prefix}{description}"),
                None => description,
            };

            transactions.push(Transaction::new(
                date,
                description,
                Money::from_decimal(amount),
            ));
        }

        if transactions.is_empty() {
            return Err(CsvError::NoDataRows);
        }

        Ok(transactions)
    }
}

fn optional_amount(field: Option<&str>) -> Result<Option<Decimal>, CsvError> {
    field
        .filter(|s| !s.trim().is_empty())
        .map(parse_amount)
        .transpose()
}

fn parse_date(s: &str, format: &str) -> Result<NaiveDate, CsvError> {
    let s = s.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, format) {
        return Ok(date);
    }

    for fmt in &[
        "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%m-%d-%Y", "%d-%m-%Y", "%Y-%m-%d",
    ] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(CsvError::InvalidDate(s.to_string()))
}

fn parse_amount(s: &str) -> Result<Decimal, CsvError> {
    let s = s.trim();
    let (negative, s) = if s.starts_with('(') && s.ends_with(')') {
        (true, &s[1..s.len() - 1])
    } else if let Some(rest) = s.strip_suffix('-') {
        // Receipt exports mark refunds with a trailing minus.
        (true, rest)
    } else {
        (false, s)
    };
    let s = s.replace([',', '$', ' '], "");
    let dec = Decimal::from_str(&s).map_err(|_| CsvError::InvalidAmount(s.to_string()))?;
    Ok(if negative { -dec } else { dec })
}

pub fn parse<R: Read>(
    reader: &mut csv::Reader<R>,
    profile: &CsvImportProfile,
) -> Result<Vec<Transaction>, CsvError> {
    CsvImporter::parse_profile(reader, profile)
}

pub fn import_csv<R: Read>(
    data: R,
    profile: &CsvImportProfile,
) -> Result<Vec<Transaction>, CsvError> {
    let delimiter = profile
        .delimiter
        .as_bytes()
        .first()
        .copied()
        .unwrap_or(b',');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(data);

    parse(&mut reader, profile)
}

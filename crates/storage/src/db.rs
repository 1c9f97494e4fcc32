use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};
use spendsort_core::{AnnotatedTransaction, Category, Money, Provenance, Transaction, YearMonth};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Amount {0} does not fit in cents")]
    AmountOutOfRange(Money),
    #[error("Corrupt row {fingerprint}: {reason}")]
    Decode { fingerprint: String, reason: String },
}

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fingerprint TEXT NOT NULL UNIQUE,
            date TEXT NOT NULL,
            year_month TEXT NOT NULL,
            raw_description TEXT NOT NULL,
            merchant TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            category TEXT,
            provenance TEXT NOT NULL,
            keyword TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transactions_year_month ON transactions(year_month)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Stable identity of an exported row. `occurrence` separates genuinely
/// repeated purchases (same day, merchant and amount) within one export.
pub fn fingerprint(tx: &Transaction, occurrence: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tx.date.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(tx.raw_description.as_bytes());
    hasher.update(b"|");
    hasher.update(tx.amount.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(occurrence.to_string().as_bytes());
    let hash: [u8; 32] = hasher.finalize().into();
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Writes a categorized batch in one SQL transaction. Rows already present
/// from an earlier export of the same file are skipped.
pub async fn insert_transactions(
    pool: &DbPool,
    batch: &[AnnotatedTransaction],
) -> Result<InsertSummary, StorageError> {
    let mut seen: HashMap<(NaiveDate, &str, Money), u32> = HashMap::new();
    let mut summary = InsertSummary::default();
    let mut db_tx = pool.begin().await?;

    for annotated in batch {
        let tx = &annotated.transaction;
        let occurrence = seen
            .entry((tx.date, tx.raw_description.as_str(), tx.amount))
            .or_insert(0);
        let fp = fingerprint(tx, *occurrence);
        *occurrence += 1;

        let cents = tx
            .amount
            .to_cents()
            .ok_or(StorageError::AmountOutOfRange(tx.amount))?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO transactions \
             (fingerprint, date, year_month, raw_description, merchant, amount_cents, category, provenance, keyword) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&fp)
        .bind(tx.date.to_string())
        .bind(tx.year_month().to_string())
        .bind(&tx.raw_description)
        .bind(&annotated.merchant)
        .bind(cents)
        .bind(tx.category.map(Category::name))
        .bind(tx.provenance.to_string())
        .bind(annotated.keyword.as_deref())
        .execute(&mut *db_tx)
        .await?;

        if result.rows_affected() == 1 {
            summary.inserted += 1;
        } else {
            summary.duplicates += 1;
        }
    }

    db_tx.commit().await?;
    tracing::info!(
        "Exported {} transactions ({} already present)",
        summary.inserted,
        summary.duplicates
    );
    Ok(summary)
}

type TransactionRow = (
    String,
    String,
    String,
    String,
    i64,
    Option<String>,
    String,
    Option<String>,
);

fn decode_row(row: TransactionRow) -> Result<AnnotatedTransaction, StorageError> {
    let (fingerprint, date, raw_description, merchant, cents, category, provenance, keyword) = row;
    let corrupt = |reason: String| StorageError::Decode {
        fingerprint: fingerprint.clone(),
        reason,
    };

    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| corrupt(format!("date '{date}': {e}")))?;
    let category = category
        .map(|c| c.parse::<Category>())
        .transpose()
        .map_err(|e| corrupt(e.to_string()))?;
    let provenance = provenance.parse::<Provenance>().map_err(corrupt)?;

    Ok(AnnotatedTransaction {
        transaction: Transaction {
            date,
            raw_description,
            amount: Money::from_cents(cents),
            category,
            provenance,
        },
        merchant,
        keyword,
    })
}

pub async fn get_transactions(
    pool: &DbPool,
    month: Option<YearMonth>,
) -> Result<Vec<AnnotatedTransaction>, StorageError> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        "SELECT fingerprint, date, raw_description, merchant, amount_cents, category, provenance, keyword \
         FROM transactions WHERE (?1 IS NULL OR year_month = ?1) ORDER BY date, id",
    )
    .bind(month.map(|m| m.to_string()))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(decode_row).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    /// `None` collects uncategorized rows.
    pub category: Option<Category>,
    pub count: i64,
    pub total: Money,
}

/// Totals per category in enumeration order, uncategorized last.
pub async fn category_totals(
    pool: &DbPool,
    month: Option<YearMonth>,
) -> Result<Vec<CategoryTotal>, StorageError> {
    let rows = sqlx::query_as::<_, (Option<String>, i64, i64)>(
        "SELECT category, COUNT(*), SUM(amount_cents) FROM transactions \
         WHERE (?1 IS NULL OR year_month = ?1) GROUP BY category",
    )
    .bind(month.map(|m| m.to_string()))
    .fetch_all(pool)
    .await?;

    let mut totals = rows
        .into_iter()
        .map(|(category, count, cents)| {
            let category = category
                .map(|c| {
                    c.parse::<Category>().map_err(|e| StorageError::Decode {
                        fingerprint: "<aggregate>".to_string(),
                        reason: e.to_string(),
                    })
                })
                .transpose()?;
            Ok(CategoryTotal {
                category,
                count,
                total: Money::from_cents(cents),
            })
        })
        .collect::<Result<Vec<_>, StorageError>>()?;

    // Some(_) sorts by enumeration order; None goes last.
    totals.sort_by_key(|t| (t.category.is_none(), t.category));
    Ok(totals)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyTotal {
    pub month: String,
    pub count: i64,
    pub total: Money,
}

pub async fn monthly_totals(pool: &DbPool) -> Result<Vec<MonthlyTotal>, StorageError> {
    let rows = sqlx::query_as::<_, (String, i64, i64)>(
        "SELECT year_month, COUNT(*), SUM(amount_cents) FROM transactions \
         GROUP BY year_month ORDER BY year_month",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(month, count, cents)| MonthlyTotal {
            month,
            count,
            total: Money::from_cents(cents),
        })
        .collect())
}

pub mod db;

pub use db::{
    category_totals, create_db, fingerprint, get_transactions, insert_transactions,
    monthly_totals, CategoryTotal, DbPool, InsertSummary, MonthlyTotal, StorageError,
};

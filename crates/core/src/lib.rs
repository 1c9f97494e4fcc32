pub mod category;
pub mod money;
pub mod period;
pub mod transaction;

pub use category::{Category, CategoryError};
pub use money::Money;
pub use period::{YearMonth, YearMonthError};
pub use transaction::{AnnotatedTransaction, Provenance, Transaction};

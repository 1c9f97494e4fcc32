pub mod csv;
pub mod folder;

pub use crate::csv::{import_csv, AmountColumns, CsvError, CsvImportProfile};
pub use crate::folder::{import_folder, CsvSource, ImportError};

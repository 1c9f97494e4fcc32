use serde::{Deserialize, Serialize};
use spendsort_core::Transaction;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::csv::{import_csv, CsvImportProfile};

/// A CSV file name registered against the profile that understands it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvSource {
    pub file: String,
    pub profile: CsvImportProfile,
}

impl CsvSource {
    pub fn new(file: impl Into<String>, profile: CsvImportProfile) -> Self {
        Self {
            file: file.into(),
            profile,
        }
    }
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("CSV folder '{0}' does not exist")]
    MissingFolder(PathBuf),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No registered CSV files found in '{folder}' (available: {available:?})")]
    NoRegisteredFiles {
        folder: PathBuf,
        available: Vec<String>,
    },
    #[error("No transactions could be read from any CSV file")]
    NoData,
}

/// Reads every registered source present in `folder`, combined and sorted by date.
///
/// A file that fails to parse is logged and skipped so one broken export does
/// not block the others.
pub fn import_folder(folder: &Path, sources: &[CsvSource]) -> Result<Vec<Transaction>, ImportError> {
    if !folder.is_dir() {
        return Err(ImportError::MissingFolder(folder.to_path_buf()));
    }

    let io_err = |source| ImportError::Io {
        path: folder.to_path_buf(),
        source,
    };
    let mut available = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if let Some(name) = entry.file_name().to_str() {
            available.push(name.to_string());
        }
    }
    available.sort();

    let mut present: Vec<&CsvSource> = sources
        .iter()
        .filter(|s| available.contains(&s.file))
        .collect();
    present.sort_by(|a, b| a.file.cmp(&b.file));

    if present.is_empty() {
        return Err(ImportError::NoRegisteredFiles {
            folder: folder.to_path_buf(),
            available,
        });
    }

    tracing::info!("Processing {} registered CSV files", present.len());

    let mut all = Vec::new();
    for source in present {
        let path = folder.join(&source.file);
        let result = File::open(&path)
            .map_err(crate::csv::CsvError::from)
            .and_then(|f| import_csv(f, &source.profile));
        match result {
            Ok(txs) => {
                tracing::info!(
                    "Read {} transactions from {} ({})",
                    txs.len(),
                    source.file,
                    source.profile.name
                );
                all.extend(txs);
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {e}", source.file);
            }
        }
    }

    if all.is_empty() {
        return Err(ImportError::NoData);
    }

    // Stable: same-day rows keep file order.
    all.sort_by_key(|t| t.date);
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendsort_core::Money;
    use std::fs;

    fn sources() -> Vec<CsvSource> {
        vec![
            CsvSource::new("citi.csv", CsvImportProfile::citi()),
            CsvSource::new("costco.csv", CsvImportProfile::costco()),
        ]
    }

    #[test]
    fn combines_registered_files_sorted_by_date() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("citi.csv"),
            "Date,Description,Debit,Credit\n01/20/2025,UBER TRIP,12.00,\n01/05/2025,SAFEWAY #123,40.00,\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("costco.csv"),
            "date,description,amount\n2025-01-10,KS WATER,4.99\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let txs = import_folder(dir.path(), &sources()).unwrap();
        let descs: Vec<_> = txs.iter().map(|t| t.raw_description.as_str()).collect();
        assert_eq!(descs, vec!["SAFEWAY #123", "COSTCO-KS WATER", "UBER TRIP"]);
        assert_eq!(txs[1].amount, Money::from_cents(499));
    }

    #[test]
    fn broken_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("citi.csv"), "Nope\n1\n").unwrap();
        fs::write(
            dir.path().join("costco.csv"),
            "date,description,amount\n2025-01-10,KS WATER,4.99\n",
        )
        .unwrap();

        let txs = import_folder(dir.path(), &sources()).unwrap();
        assert_eq!(txs.len(), 1);
    }

    #[test]
    fn missing_folder_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = import_folder(&dir.path().join("nope"), &sources());
        assert!(matches!(result, Err(ImportError::MissingFolder(_))));
    }

    #[test]
    fn unregistered_files_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("other.csv"), "a,b\n").unwrap();
        let result = import_folder(dir.path(), &sources());
        match result {
            Err(ImportError::NoRegisteredFiles { available, .. }) => {
                assert_eq!(available, vec!["other.csv".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn all_files_failing_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("costco.csv"), "date,description,amount\n").unwrap();
        let result = import_folder(dir.path(), &sources());
        assert!(matches!(result, Err(ImportError::NoData)));
    }
}

use serde::Serialize;
use spendsort_core::Category;
use std::path::PathBuf;
use thiserror::Error;

/// The rule store could not be read. Fatal: categorization cannot proceed.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("IO error reading rule file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Rule file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Rule file references unknown category '{0}'")]
    UnknownCategory(String),
    #[error("Rule file lists {category} under both '{first}' and '{second}'")]
    DuplicateCategory {
        category: Category,
        first: String,
        second: String,
    },
    #[error("Rules for '{0}' must be a list of keywords")]
    NotAList(String),
    #[error("Rule for '{category}' is not a string: {value}")]
    NotAString { category: String, value: String },
}

/// The rule store could not be written back. Batch results stay valid.
#[derive(Debug, Error)]
#[error("Failed to write rule file {path}: {source}")]
pub struct ConfigWriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    RetriesExhausted { attempts: u32 },
    Declined,
    OperatorUnavailable,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedReason::RetriesExhausted { attempts } => {
                write!(f, "no valid selection after {attempts} attempts")
            }
            UnresolvedReason::Declined => write!(f, "operator declined"),
            UnresolvedReason::OperatorUnavailable => write!(f, "operator input failed"),
        }
    }
}

/// Non-fatal conditions collected per batch instead of aborting it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    #[error("'{description}': keyword '{keyword}' already belongs to {existing}, not added to {requested}")]
    AmbiguousRule {
        description: String,
        keyword: String,
        existing: Category,
        requested: Category,
    },
    #[error("'{description}' left uncategorized: {reason}")]
    UnresolvedTransaction {
        description: String,
        reason: UnresolvedReason,
    },
    #[error("'{description}': no usable keyword could be derived, nothing learned")]
    UnusableKeyword { description: String },
}

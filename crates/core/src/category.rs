use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of spending buckets. Declaration order is the fixed
/// enumeration order used for every tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Food,
    Shopping,
    Travel,
    Utilities,
    Healthcare,
    Entertainment,
    Services,
    Payment,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    #[error("Unknown category: '{0}'")]
    Unknown(String),
    #[error("Category index {0} is out of range (1-{max})", max = Category::ALL.len())]
    IndexOutOfRange(usize),
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Food,
        Category::Shopping,
        Category::Travel,
        Category::Utilities,
        Category::Healthcare,
        Category::Entertainment,
        Category::Services,
        Category::Payment,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Shopping => "Shopping",
            Category::Travel => "Travel",
            Category::Utilities => "Utilities",
            Category::Healthcare => "Healthcare",
            Category::Entertainment => "Entertainment",
            Category::Services => "Services",
            Category::Payment => "Payment",
        }
    }

    /// 1-based position in the enumeration, as shown to the operator.
    pub fn number(self) -> usize {
        Category::ALL
            .iter()
            .position(|c| *c == self)
            .map_or(0, |i| i + 1)
    }

    pub fn from_number(n: usize) -> Result<Self, CategoryError> {
        n.checked_sub(1)
            .and_then(|i| Category::ALL.get(i).copied())
            .ok_or(CategoryError::IndexOutOfRange(n))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for Category {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CategoryError::Unknown(wanted.to_string()))
    }
}

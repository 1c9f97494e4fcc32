use serde::{Deserialize, Serialize};

// Words too common to identify a merchant: as a substring keyword they would
// match unrelated descriptions. Tokens of two characters or fewer are never
// used, so they are not listed.
const STOP_WORDS: &[&str] = &[
    "THE", "AND", "FOR", "INC", "LLC", "LTD", "CORP", "COM", "WWW", "PHONE", "NUMBER", "STORE",
    "SHOP",
];

/// How a new keyword is cut out of a normalized merchant when the operator
/// categorizes an unknown transaction.
///
/// Every policy returns a substring of the merchant, so the learned keyword
/// always matches the transaction it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeywordPolicy {
    /// First meaningful word (`STARBUCKS STORE` -> `STARBUCKS`).
    #[default]
    FirstWord,
    /// Up to `count` consecutive meaningful words from the first one.
    LeadingWords { count: usize },
    WholeMerchant,
}

fn is_meaningful(token: &str) -> bool {
    token.chars().count() > 2
        && token.chars().any(char::is_alphabetic)
        && !STOP_WORDS.contains(&token.to_uppercase().as_str())
}

impl KeywordPolicy {
    /// Empty only when `normalized` is blank.
    pub fn derive(self, normalized: &str) -> String {
        let merchant = normalized.trim();
        let count = match self {
            KeywordPolicy::WholeMerchant => return merchant.to_string(),
            KeywordPolicy::FirstWord => 1,
            KeywordPolicy::LeadingWords { count } => count.max(1),
        };

        let tokens: Vec<&str> = merchant.split(' ').collect();
        let Some(start) = tokens.iter().position(|t| is_meaningful(t)) else {
            return merchant.to_string();
        };

        tokens[start..]
            .iter()
            .take(count)
            .take_while(|t| is_meaningful(t))
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

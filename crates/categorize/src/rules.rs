//! The keyword rule store: per category, a set of case-insensitive keywords.
//!
//! On disk it is a flat TOML table, one key per category:
//!
//! ```toml
//! Food = ["starbucks", "cafe"]
//! Shopping = ["amazon"]
//! ```

use spendsort_core::Category;
use std::collections::BTreeMap;

use crate::error::ConfigLoadError;

const FILE_HEADER: &str = "# Keyword rules per category. Matching is a case-insensitive substring test.\n\
# Edit freely; keywords learned during categorization are appended here.\n\n";

/// Result of asking the store to learn a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnOutcome {
    Added,
    /// Already known under the same category; nothing changed.
    AlreadyPresent,
    /// Known under another category; the store was left untouched.
    Conflict { existing: Category },
    /// Blank after canonicalization; never stored since it would match everything.
    EmptyKeyword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleStore {
    // Every category is always present; BTreeMap iteration follows enumeration order.
    rules: BTreeMap<Category, Vec<String>>,
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::empty()
    }
}

pub(crate) fn canonical(keyword: &str) -> String {
    keyword.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl RuleStore {
    pub fn empty() -> Self {
        Self {
            rules: Category::ALL.iter().map(|c| (*c, Vec::new())).collect(),
        }
    }

    /// Builds a store from literal rules, as a hand-edited file would.
    /// Cross-category duplicates are kept, like on load.
    pub fn from_rules<'a, I, K>(rules: I) -> Self
    where
        I: IntoIterator<Item = (Category, K)>,
        K: IntoIterator<Item = &'a str>,
    {
        let mut store = Self::empty();
        for (category, keywords) in rules {
            for keyword in keywords {
                store.insert_unchecked(category, keyword);
            }
        }
        store
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigLoadError> {
        let table: toml::Table = toml::from_str(toml_content)?;
        let mut store = Self::empty();
        let mut keys: BTreeMap<Category, String> = BTreeMap::new();

        for (key, value) in table {
            let category: Category = key
                .parse()
                .map_err(|_| ConfigLoadError::UnknownCategory(key.clone()))?;
            // Keys match case-insensitively, so `food` and `Food` would merge.
            if let Some(first) = keys.insert(category, key.clone()) {
                return Err(ConfigLoadError::DuplicateCategory {
                    category,
                    first,
                    second: key,
                });
            }
            let items = match value {
                toml::Value::Array(items) => items,
                _ => return Err(ConfigLoadError::NotAList(key)),
            };
            for item in items {
                match item {
                    toml::Value::String(keyword) => store.insert_unchecked(category, &keyword),
                    other => {
                        return Err(ConfigLoadError::NotAString {
                            category: key,
                            value: other.to_string(),
                        })
                    }
                }
            }
        }

        for (keyword, categories) in store.conflicts() {
            tracing::warn!(
                "Keyword '{keyword}' is listed under {categories:?}; {} wins",
                categories[0]
            );
        }

        Ok(store)
    }

    pub fn to_toml(&self) -> String {
        let mut out = String::from(FILE_HEADER);
        for (category, keywords) in &self.rules {
            let array = toml::Value::Array(
                keywords
                    .iter()
                    .map(|k| toml::Value::String(k.clone()))
                    .collect(),
            );
            out.push_str(&format!("{category} = {array}\n"));
        }
        out
    }

    fn insert_unchecked(&mut self, category: Category, keyword: &str) {
        let keyword = canonical(keyword);
        if keyword.is_empty() {
            return;
        }
        let set = self.rules.entry(category).or_default();
        if !set.contains(&keyword) {
            set.push(keyword);
        }
    }

    /// Exact, case-insensitive lookup. A keyword listed under several
    /// categories resolves to the earliest one in enumeration order.
    pub fn find(&self, keyword: &str) -> Option<Category> {
        let keyword = canonical(keyword);
        self.rules
            .iter()
            .find(|(_, set)| set.contains(&keyword))
            .map(|(category, _)| *category)
    }

    pub fn learn(&mut self, category: Category, keyword: &str) -> LearnOutcome {
        let canonical_keyword = canonical(keyword);
        if canonical_keyword.is_empty() {
            return LearnOutcome::EmptyKeyword;
        }
        if self.keywords(category).contains(&canonical_keyword) {
            return LearnOutcome::AlreadyPresent;
        }
        if let Some(existing) = self.find(&canonical_keyword) {
            return LearnOutcome::Conflict { existing };
        }
        self.rules.entry(category).or_default().push(canonical_keyword);
        LearnOutcome::Added
    }

    pub fn keywords(&self, category: Category) -> &[String] {
        self.rules.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &[String])> {
        self.rules.iter().map(|(c, k)| (*c, k.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> BTreeMap<Category, usize> {
        self.rules.iter().map(|(c, k)| (*c, k.len())).collect()
    }

    /// Keywords listed under more than one category, with those categories
    /// in enumeration order.
    pub fn conflicts(&self) -> Vec<(String, Vec<Category>)> {
        let mut seen: BTreeMap<&str, Vec<Category>> = BTreeMap::new();
        for (category, keywords) in &self.rules {
            for keyword in keywords {
                seen.entry(keyword.as_str()).or_default().push(*category);
            }
        }
        seen.into_iter()
            .filter(|(_, cats)| cats.len() > 1)
            .map(|(k, cats)| (k.to_string(), cats))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_has_every_category() {
        let store = RuleStore::empty();
        assert_eq!(store.iter().count(), Category::ALL.len());
        assert!(store.is_empty());
    }

    #[test]
    fn find_is_case_insensitive() {
        let store = RuleStore::from_rules([(Category::Food, ["Starbucks"])]);
        assert_eq!(store.find("STARBUCKS"), Some(Category::Food));
        assert_eq!(store.find("starbucks"), Some(Category::Food));
        assert_eq!(store.find("star"), None);
    }

    #[test]
    fn find_duplicate_resolves_by_enumeration_order() {
        let store = RuleStore::from_rules([
            (Category::Payment, ["amazon"]),
            (Category::Shopping, ["amazon"]),
        ]);
        assert_eq!(store.find("amazon"), Some(Category::Shopping));
        assert_eq!(
            store.conflicts(),
            vec![("amazon".to_string(), vec![Category::Shopping, Category::Payment])]
        );
    }

    #[test]
    fn learn_twice_equals_learn_once() {
        let mut once = RuleStore::empty();
        assert_eq!(once.learn(Category::Food, "pizza"), LearnOutcome::Added);

        let mut twice = RuleStore::empty();
        twice.learn(Category::Food, "pizza");
        assert_eq!(twice.learn(Category::Food, "PIZZA"), LearnOutcome::AlreadyPresent);

        assert_eq!(once, twice);
    }

    #[test]
    fn learn_rejects_cross_category_keyword() {
        let mut store = RuleStore::from_rules([(Category::Food, ["market"])]);
        let before = store.clone();
        assert_eq!(
            store.learn(Category::Shopping, "market"),
            LearnOutcome::Conflict {
                existing: Category::Food
            }
        );
        assert_eq!(store, before);
    }

    #[test]
    fn learn_rejects_blank_keyword() {
        let mut store = RuleStore::empty();
        assert_eq!(store.learn(Category::Food, "   "), LearnOutcome::EmptyKeyword);
        assert!(store.is_empty());
    }

    #[test]
    fn from_toml_canonicalizes_and_dedups() {
        let store = RuleStore::from_toml(
            r#"
            Food = ["Coffee  Shop", "coffee shop", "", "cafe"]
            travel = ["delta air"]
            "#,
        )
        .unwrap();
        assert_eq!(store.keywords(Category::Food), ["coffee shop", "cafe"]);
        assert_eq!(store.keywords(Category::Travel), ["delta air"]);
        assert!(store.keywords(Category::Payment).is_empty());
    }

    #[test]
    fn from_toml_rejects_unknown_category() {
        let err = RuleStore::from_toml(r#"Groceries = ["safeway"]"#).unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnknownCategory(c) if c == "Groceries"));
    }

    #[test]
    fn from_toml_rejects_aliased_category_keys() {
        let err = RuleStore::from_toml(
            r#"
            food = ["pizza"]
            Food = ["starbucks"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::DuplicateCategory {
                category: Category::Food,
                ..
            }
        ));
    }

    #[test]
    fn from_toml_rejects_non_list() {
        let err = RuleStore::from_toml(r#"Food = "pizza""#).unwrap_err();
        assert!(matches!(err, ConfigLoadError::NotAList(c) if c == "Food"));
    }

    #[test]
    fn from_toml_rejects_non_string_item() {
        let err = RuleStore::from_toml(r#"Food = ["pizza", 3]"#).unwrap_err();
        assert!(matches!(err, ConfigLoadError::NotAString { .. }));
    }

    #[test]
    fn from_toml_rejects_garbage() {
        assert!(matches!(
            RuleStore::from_toml("Food = [").unwrap_err(),
            ConfigLoadError::Parse(_)
        ));
    }

    #[test]
    fn to_toml_reloads_to_same_store() {
        let store = RuleStore::from_rules([
            (Category::Food, vec!["starbucks", "dough zone"]),
            (Category::Utilities, vec!["puget sound \"energy\""]),
        ]);
        let text = store.to_toml();
        assert!(text.find("Food =").unwrap() < text.find("Shopping =").unwrap());
        assert_eq!(RuleStore::from_toml(&text).unwrap(), store);
    }

    #[test]
    fn counts_cover_all_categories() {
        let store = RuleStore::from_rules([(Category::Food, ["a", "b"])]);
        let counts = store.counts();
        assert_eq!(counts[&Category::Food], 2);
        assert_eq!(counts[&Category::Payment], 0);
        assert_eq!(store.len(), 2);
    }
}

use serde::{Deserialize, Serialize};
use spendsort_core::{Category, Transaction};

use crate::error::{UnresolvedReason, Warning};
use crate::keyword::KeywordPolicy;
use crate::normalize::normalize;
use crate::operator::{Operator, Prompt};
use crate::rules::{canonical, LearnOutcome, RuleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Invalid replies tolerated per transaction before giving up on it.
    pub max_attempts: u32,
    pub keyword_policy: KeywordPolicy,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            keyword_policy: KeywordPolicy::default(),
        }
    }
}

/// Outcome of asking the operator about one unknown transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Assigned {
        category: Category,
        /// Keyword added to the store, in stored (canonical) form.
        learned: Option<String>,
        warning: Option<Warning>,
    },
    Unresolved {
        warning: Warning,
    },
}

/// Accepts a 1-based index or a category name.
pub fn parse_selection(reply: &str) -> Result<Category, String> {
    let reply = reply.trim();
    if reply.is_empty() {
        return Err("is empty; enter a number or a category name".to_string());
    }
    if let Ok(n) = reply.parse::<usize>() {
        return Category::from_number(n).map_err(|e| e.to_string());
    }
    reply.parse::<Category>().map_err(|e| e.to_string())
}

pub struct Learner<O> {
    operator: O,
    config: LearnerConfig,
}

impl<O: Operator> Learner<O> {
    pub fn new(operator: O, config: LearnerConfig) -> Self {
        Self { operator, config }
    }

    pub fn operator(&self) -> &O {
        &self.operator
    }

    pub fn into_operator(self) -> O {
        self.operator
    }

    /// Asks the operator for a category and teaches the store a keyword for
    /// it. A keyword owned by another category is not added, but the
    /// operator's choice still stands.
    pub fn resolve_unknown(&mut self, tx: &Transaction, store: &mut RuleStore) -> Resolution {
        let merchant = normalize(&tx.raw_description);

        let category = match self.select(tx, &merchant) {
            Ok(category) => category,
            Err(reason) => {
                let warning = Warning::UnresolvedTransaction {
                    description: tx.raw_description.clone(),
                    reason,
                };
                tracing::warn!("{warning}");
                return Resolution::Unresolved { warning };
            }
        };

        let keyword = self.config.keyword_policy.derive(&merchant);
        match store.learn(category, &keyword) {
            LearnOutcome::Added => {
                let keyword = canonical(&keyword);
                tracing::info!("Added '{keyword}' to {category} keywords");
                Resolution::Assigned {
                    category,
                    learned: Some(keyword),
                    warning: None,
                }
            }
            LearnOutcome::AlreadyPresent => Resolution::Assigned {
                category,
                learned: None,
                warning: None,
            },
            LearnOutcome::Conflict { existing } => {
                let warning = Warning::AmbiguousRule {
                    description: tx.raw_description.clone(),
                    keyword: canonical(&keyword),
                    existing,
                    requested: category,
                };
                tracing::warn!("{warning}");
                Resolution::Assigned {
                    category,
                    learned: None,
                    warning: Some(warning),
                }
            }
            LearnOutcome::EmptyKeyword => {
                let warning = Warning::UnusableKeyword {
                    description: tx.raw_description.clone(),
                };
                tracing::warn!("{warning}");
                Resolution::Assigned {
                    category,
                    learned: None,
                    warning: Some(warning),
                }
            }
        }
    }

    fn select(&mut self, tx: &Transaction, merchant: &str) -> Result<Category, UnresolvedReason> {
        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let prompt = Prompt {
                date: tx.date,
                raw_description: tx.raw_description.clone(),
                merchant: merchant.to_string(),
                amount: tx.amount,
                attempt,
                max_attempts,
            };
            let reply = match self.operator.ask(&prompt) {
                Ok(Some(reply)) => reply,
                Ok(None) => return Err(UnresolvedReason::Declined),
                Err(e) => {
                    tracing::warn!("Operator prompt failed: {e}");
                    return Err(UnresolvedReason::OperatorUnavailable);
                }
            };
            match parse_selection(&reply) {
                Ok(category) => return Ok(category),
                Err(reason) => self.operator.rejected(&reply, &reason),
            }
        }
        Err(UnresolvedReason::RetriesExhausted {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::ScriptedOperator;
    use chrono::NaiveDate;
    use spendsort_core::Money;

    fn tx(desc: &str) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            desc,
            Money::from_cents(845),
        )
    }

    fn learner(replies: &[&str]) -> Learner<ScriptedOperator> {
        Learner::new(
            ScriptedOperator::new(replies.iter().copied()),
            LearnerConfig::default(),
        )
    }

    #[test]
    fn parse_selection_accepts_index_and_name() {
        assert_eq!(parse_selection("1"), Ok(Category::Food));
        assert_eq!(parse_selection(" 8 "), Ok(Category::Payment));
        assert_eq!(parse_selection("travel"), Ok(Category::Travel));
        assert!(parse_selection("0").is_err());
        assert!(parse_selection("9").is_err());
        assert!(parse_selection("").is_err());
        assert!(parse_selection("groceries").is_err());
    }

    #[test]
    fn learns_first_word_of_merchant() {
        let mut store = RuleStore::empty();
        let mut learner = learner(&["Food"]);
        let resolution = learner.resolve_unknown(&tx("STARBUCKS STORE 0452 SEATTLE WA"), &mut store);
        assert_eq!(
            resolution,
            Resolution::Assigned {
                category: Category::Food,
                learned: Some("starbucks".to_string()),
                warning: None,
            }
        );
        assert_eq!(store.find("STARBUCKS"), Some(Category::Food));

        let prompt = &learner.operator().prompts[0];
        assert_eq!(prompt.merchant, "STARBUCKS STORE");
        assert_eq!(prompt.raw_description, "STARBUCKS STORE 0452 SEATTLE WA");
    }

    #[test]
    fn invalid_replies_are_reprompted() {
        let mut store = RuleStore::empty();
        let mut learner = learner(&["", "42", "3"]);
        let resolution = learner.resolve_unknown(&tx("DELTA AIR LINES"), &mut store);
        assert!(matches!(
            resolution,
            Resolution::Assigned { category: Category::Travel, .. }
        ));
        let op = learner.operator();
        assert_eq!(op.prompts.len(), 3);
        assert_eq!(op.prompts[2].attempt, 3);
        assert_eq!(op.rejections, vec!["".to_string(), "42".to_string()]);
    }

    #[test]
    fn exhausted_retries_leave_unresolved() {
        let mut store = RuleStore::empty();
        let mut learner = learner(&["x", "y", "z", "1"]);
        let resolution = learner.resolve_unknown(&tx("MYSTERY SHOP"), &mut store);
        assert_eq!(
            resolution,
            Resolution::Unresolved {
                warning: Warning::UnresolvedTransaction {
                    description: "MYSTERY SHOP".to_string(),
                    reason: UnresolvedReason::RetriesExhausted { attempts: 3 },
                }
            }
        );
        assert!(store.is_empty());
        assert_eq!(learner.operator().remaining(), 1);
    }

    #[test]
    fn decline_leaves_unresolved() {
        let mut store = RuleStore::empty();
        let mut learner = Learner::new(ScriptedOperator::default(), LearnerConfig::default());
        let resolution = learner.resolve_unknown(&tx("MYSTERY SHOP"), &mut store);
        assert!(matches!(
            resolution,
            Resolution::Unresolved {
                warning: Warning::UnresolvedTransaction {
                    reason: UnresolvedReason::Declined,
                    ..
                }
            }
        ));
    }

    #[test]
    fn collision_keeps_choice_but_not_keyword() {
        let mut store = RuleStore::from_rules([(Category::Food, ["fresh market"])]);
        let before = store.clone();
        let mut learner = Learner::new(
            ScriptedOperator::new(["Shopping"]),
            LearnerConfig {
                keyword_policy: KeywordPolicy::WholeMerchant,
                ..LearnerConfig::default()
            },
        );
        let resolution = learner.resolve_unknown(&tx("fresh market"), &mut store);
        assert_eq!(
            resolution,
            Resolution::Assigned {
                category: Category::Shopping,
                learned: None,
                warning: Some(Warning::AmbiguousRule {
                    description: "fresh market".to_string(),
                    keyword: "fresh market".to_string(),
                    existing: Category::Food,
                    requested: Category::Shopping,
                }),
            }
        );
        assert_eq!(store, before);
    }

    #[test]
    fn blank_description_categorizes_without_learning() {
        let mut store = RuleStore::empty();
        let mut learner = learner(&["2"]);
        let resolution = learner.resolve_unknown(&tx("   "), &mut store);
        assert!(matches!(
            resolution,
            Resolution::Assigned {
                category: Category::Shopping,
                learned: None,
                warning: Some(Warning::UnusableKeyword { .. }),
            }
        ));
        assert!(store.is_empty());
    }
}

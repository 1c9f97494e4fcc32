//! Batch categorization: normalize, match, and fall back to the operator.
//!
//! Transactions are handled strictly in input order, one at a time, so the
//! order in which unknown merchants are presented is reproducible. The rule
//! store is flushed once at the end of a batch, and only if something was
//! learned. Keywords learned in a batch that never reaches that flush (the
//! process is killed mid-batch) are lost; rerunning the import re-asks for
//! them.

use serde::Serialize;
use spendsort_core::{AnnotatedTransaction, Category, Money, Provenance, Transaction};
use std::collections::BTreeMap;

use crate::backend::RuleBackend;
use crate::error::{ConfigWriteError, Warning};
use crate::learner::{Learner, Resolution};
use crate::matcher::match_category;
use crate::normalize::normalize;
use crate::operator::Operator;
use crate::rules::RuleStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub rule_matched: usize,
    pub manual: usize,
    pub unset: usize,
    pub keywords_learned: usize,
    /// Keywords per category after the batch.
    pub rule_counts: BTreeMap<Category, usize>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug)]
pub struct BatchReport {
    pub transactions: Vec<AnnotatedTransaction>,
    pub stats: BatchStats,
    /// Set when learned keywords could not be saved. The transactions above
    /// are still complete.
    pub flush_error: Option<ConfigWriteError>,
}

impl BatchReport {
    /// Spend per category, uncategorized rows excluded.
    pub fn totals_by_category(&self) -> BTreeMap<Category, Money> {
        let mut totals = BTreeMap::new();
        for annotated in &self.transactions {
            if let Some(category) = annotated.transaction.category {
                let total = totals.entry(category).or_insert_with(Money::zero);
                *total = *total + annotated.transaction.amount;
            }
        }
        totals
    }
}

pub struct Pipeline<O, B> {
    learner: Learner<O>,
    backend: B,
}

impl<O: Operator, B: RuleBackend> Pipeline<O, B> {
    pub fn new(learner: Learner<O>, backend: B) -> Self {
        Self { learner, backend }
    }

    pub fn learner(&self) -> &Learner<O> {
        &self.learner
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_parts(self) -> (Learner<O>, B) {
        (self.learner, self.backend)
    }

    pub fn categorize_batch(
        &mut self,
        transactions: Vec<Transaction>,
        store: &mut RuleStore,
    ) -> BatchReport {
        let mut stats = BatchStats {
            total: transactions.len(),
            ..BatchStats::default()
        };
        let mut annotated = Vec::with_capacity(transactions.len());

        for tx in transactions {
            let merchant = normalize(&tx.raw_description);

            if let Some(hit) = match_category(store, &merchant) {
                tracing::debug!(
                    "{} -> {} (keyword '{}')",
                    tx.raw_description,
                    hit.category,
                    hit.keyword
                );
                stats.rule_matched += 1;
                annotated.push(AnnotatedTransaction {
                    transaction: tx.categorized(hit.category, Provenance::Rule),
                    merchant,
                    keyword: Some(hit.keyword),
                });
                continue;
            }

            match self.learner.resolve_unknown(&tx, store) {
                Resolution::Assigned {
                    category,
                    learned,
                    warning,
                } => {
                    if learned.is_some() {
                        stats.keywords_learned += 1;
                    }
                    if let Some(warning) = warning {
                        stats.warnings.push(warning);
                    }
                    let keyword = match match_category(store, &merchant) {
                        Some(hit) if hit.category == category => Some(hit.keyword),
                        Some(hit) => {
                            tracing::debug!(
                                "{merchant} now matches {} but operator chose {category}",
                                hit.category
                            );
                            learned
                        }
                        None => learned,
                    };
                    stats.manual += 1;
                    annotated.push(AnnotatedTransaction {
                        transaction: tx.categorized(category, Provenance::Manual),
                        merchant,
                        keyword,
                    });
                }
                Resolution::Unresolved { warning } => {
                    stats.unset += 1;
                    stats.warnings.push(warning);
                    annotated.push(AnnotatedTransaction {
                        transaction: tx.unresolved(),
                        merchant,
                        keyword: None,
                    });
                }
            }
        }

        let flush_error = if stats.keywords_learned > 0 {
            self.backend.flush(store).err()
        } else {
            None
        };
        if let Some(e) = &flush_error {
            tracing::error!("{e}; learned keywords were not saved");
        }

        stats.rule_counts = store.counts();
        tracing::info!(
            "Categorized {} transactions: {} by rule, {} manual, {} unset, {} keywords learned",
            stats.total,
            stats.rule_matched,
            stats.manual,
            stats.unset,
            stats.keywords_learned
        );

        BatchReport {
            transactions: annotated,
            stats,
            flush_error,
        }
    }
}

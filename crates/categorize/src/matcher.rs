use spendsort_core::Category;

use crate::rules::RuleStore;

/// A keyword hit: the category it belongs to and the keyword itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub category: Category,
    pub keyword: String,
}

/// Substring match of every keyword against the normalized merchant.
///
/// The longest matching keyword wins; equal lengths go to the category that
/// comes first in enumeration order. `None` means unknown, which is the cue
/// for the learner rather than an error.
pub fn match_category(store: &RuleStore, normalized: &str) -> Option<RuleMatch> {
    let text = normalized.to_lowercase();
    let mut best: Option<(usize, RuleMatch)> = None;

    for (category, keywords) in store.iter() {
        for keyword in keywords {
            if keyword.is_empty() || !text.contains(keyword.as_str()) {
                continue;
            }
            let len = keyword.chars().count();
            if best.as_ref().map_or(true, |(best_len, _)| len > *best_len) {
                best = Some((
                    len,
                    RuleMatch {
                        category,
                        keyword: keyword.clone(),
                    },
                ));
            }
        }
    }

    best.map(|(_, m)| m)
}

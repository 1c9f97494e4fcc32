//! Merchant normalization: turns a raw card-statement description into a
//! stable key for matching and learning.
//!
//! `normalize` is deterministic and idempotent. Stripping rules are applied to
//! a fixpoint, and none of them may remove the last remaining token.

use std::sync::OnceLock;

use regex::Regex;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Store numbers, auth codes, `#1199`, phone numbers: any token carrying a digit.
re!(re_reference_token, r"^#?[A-Z0-9*#./\-]*[0-9][A-Z0-9*#./\-]*$");

/// Payment-processor prefixes, checked against the uppercased description.
const PROCESSOR_PREFIXES: &[&str] = &["SQ *", "SQ*", "TST*", "FSP*", "SP ", "PAYPAL *", "6602-"];

const STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC", "PR",
];

pub fn normalize(raw: &str) -> String {
    let base = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();
    if base.is_empty() {
        return base;
    }

    let mut current = base.clone();
    loop {
        let next = strip_trailing_noise(&strip_processor_prefix(&current));
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() {
        base
    } else {
        current
    }
}

fn strip_processor_prefix(s: &str) -> String {
    for prefix in PROCESSOR_PREFIXES {
        if let Some(rest) = s.strip_prefix(prefix) {
            let rest = rest.trim_start();
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    s.to_string()
}

/// Removes one trailing reference token, or one `CITY ST` pair.
fn strip_trailing_noise(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split(' ').collect();
    let Some(last) = tokens.last().copied() else {
        return s.to_string();
    };

    if tokens.len() >= 2 && re_reference_token().is_match(last) {
        tokens.pop();
    } else if STATE_CODES.contains(&last) {
        match tokens.len() {
            0 | 1 => {}
            2 => {
                tokens.pop();
            }
            _ => {
                tokens.truncate(tokens.len() - 2);
            }
        }
    }

    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        "   ",
        "STARBUCKS STORE 0452 SEATTLE WA",
        "STARBUCKS #1199 BOISE ID",
        "sq *blue bottle coffee   oakland ca",
        "TST* DOUGH ZONE 123-456-7890 BELLEVUE WA",
        "AMAZON MKTPL*AB12C3 AMZN.COM/BILL WA",
        "UBER CA",
        "WA",
        "12345",
        "SQ *",
        "6602-PUGET SOUND ENERGY",
        "Netflix.com",
        "COSTCO-KS WATER",
        "straße café",
    ];

    #[test]
    fn uppercases_and_collapses_whitespace() {
        assert_eq!(normalize("  netflix    .com "), "NETFLIX .COM");
    }

    #[test]
    fn strips_store_number_city_and_state() {
        assert_eq!(normalize("STARBUCKS STORE 0452 SEATTLE WA"), "STARBUCKS STORE");
        assert_eq!(normalize("STARBUCKS #1199 BOISE ID"), "STARBUCKS");
    }

    #[test]
    fn strips_processor_prefixes() {
        assert_eq!(normalize("sq *blue bottle coffee oakland ca"), "BLUE BOTTLE COFFEE");
        assert_eq!(normalize("TST* DOUGH ZONE 123-456-7890 BELLEVUE WA"), "DOUGH ZONE");
        assert_eq!(normalize("6602-PUGET SOUND ENERGY"), "PUGET SOUND ENERGY");
    }

    #[test]
    fn lone_state_code_after_merchant_is_dropped() {
        assert_eq!(normalize("UBER CA"), "UBER");
    }

    #[test]
    fn never_strips_to_empty() {
        assert_eq!(normalize("WA"), "WA");
        assert_eq!(normalize("12345"), "12345");
        assert_eq!(normalize("SQ *"), "SQ *");
    }

    #[test]
    fn empty_and_blank_map_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \t\n "), "");
    }

    #[test]
    fn idempotent_over_samples() {
        for s in SAMPLES {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn deterministic() {
        for s in SAMPLES {
            assert_eq!(normalize(s), normalize(s));
        }
    }
}

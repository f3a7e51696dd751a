//! Deterministic, network-free decision fallback.

use std::sync::OnceLock;

use regex::RegexSet;

/// Promotional phrases that flag an item as low-value. Matching is
/// case-insensitive over the full item text.
const PROMO_PATTERNS: &[&str] = &[
    r"(?i)limited time offer",
    r"(?i)use my code",
    r"(?i)discount code",
    r"(?i)link in bio",
    r"(?i)\bsponsored\b",
    r"(?i)sign up now",
    r"(?i)register now",
    r"(?i)\bgiveaway\b",
];

fn promo_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| RegexSet::new(PROMO_PATTERNS).expect("promo patterns should be valid"))
}

/// Fallback decision rule: skip obvious promotional content, engage with
/// everything else. Cannot fail and never touches the network.
pub fn engage_by_heuristic(text: &str) -> bool {
    !promo_set().is_match(text)
}

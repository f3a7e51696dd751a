//! Candidate location against the live viewport.

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::locator::{Candidate, LocatorRule, topmost_candidate};
use crate::io::browser::Browser;

/// Find the next item to read: the topmost qualifying item in the near band.
///
/// Returns `Ok(None)` when nothing qualifies; the session scrolls and
/// retries.
pub fn locate_candidate(browser: &dyn Browser, rule: &LocatorRule) -> Result<Option<Candidate>> {
    let items = browser.rendered_items().context("list rendered items")?;
    let candidate = topmost_candidate(&items, rule);
    match &candidate {
        Some(candidate) => {
            debug!(id = %candidate.id, position = candidate.position.0, "located candidate");
        }
        None => debug!(rendered = items.len(), "no candidate in band"),
    }
    Ok(candidate)
}

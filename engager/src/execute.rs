//! Engagement execution through the browser capability.

use std::error::Error;
use std::fmt;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::text::char_prefix;
use crate::core::types::{ItemId, ItemSnapshot};
use crate::io::browser::Browser;

/// How many snapshot characters the UI-action hints quote for targeting.
const HINT_CHARS: usize = 80;

/// Parameters for the UI flow.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteConfig {
    /// Delay after each UI action; the page is eventually consistent.
    pub settle: Duration,
}

/// The item at the snapshot's position no longer carries the expected
/// identifier: the feed re-rendered between decision and execution.
///
/// Raised before any UI action, so a reflow never causes a mistargeted
/// submission. Item-fatal, not run-fatal; callers downcast and skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflowError {
    pub expected: ItemId,
    pub found: Option<ItemId>,
}

impl fmt::Display for ReflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.found {
            Some(found) => write!(f, "feed reflow: expected {} but found {found}", self.expected),
            None => write!(f, "feed reflow: expected {} but found no identifier", self.expected),
        }
    }
}

impl Error for ReflowError {}

/// Submit the comment on the snapshot's item.
///
/// Re-verifies the item identifier immediately before acting; on mismatch,
/// fails with [`ReflowError`] without having touched the page. The UI flow
/// is: center the item, open its composer, type the comment, submit.
pub fn execute_engagement(
    browser: &dyn Browser,
    snapshot: &ItemSnapshot,
    comment: &str,
    config: &ExecuteConfig,
) -> Result<()> {
    let found = browser
        .identifier_at(snapshot.position)
        .context("re-verify item identifier")?;
    if found.as_ref() != Some(&snapshot.id) {
        return Err(ReflowError {
            expected: snapshot.id.clone(),
            found,
        }
        .into());
    }

    let target = target_hint(snapshot);

    browser
        .act(&format!(
            "Scroll so {target} is centered in the viewport."
        ))
        .context("center item")?;
    settle(config.settle);

    browser
        .act(&format!("Open the comment composer on {target}."))
        .context("open composer")?;
    settle(config.settle);

    browser
        .act(&format!(
            "Type the following comment into the open composer, verbatim: {comment}"
        ))
        .context("type comment")?;
    settle(config.settle);

    browser
        .act("Submit the comment in the open composer.")
        .context("submit comment")?;
    settle(config.settle);

    info!(id = %snapshot.id, "comment submitted");
    Ok(())
}

/// Natural-language description of the target item, so the action agent
/// operates on the intended node even if the layout shifted slightly.
fn target_hint(snapshot: &ItemSnapshot) -> String {
    let preview = char_prefix(&snapshot.text, HINT_CHARS).replace('\n', " ");
    match snapshot.author.as_deref() {
        Some(author) => {
            format!("the feed item by {author} that starts with \"{preview}\"")
        }
        None => format!("the feed item that starts with \"{preview}\""),
    }
}

fn settle(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    debug!(ms = duration.as_millis() as u64, "settling");
    thread::sleep(duration);
}

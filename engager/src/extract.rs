//! Snapshot capture for a located candidate.

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::locator::Candidate;
use crate::core::text::assemble_text;
use crate::core::types::ItemSnapshot;
use crate::io::browser::Browser;

/// Thresholds for text assembly.
#[derive(Debug, Clone, Copy)]
pub struct ExtractRule {
    /// Fragments shorter than this are treated as UI chrome and dropped.
    pub min_fragment_chars: usize,
}

/// Capture an immutable snapshot of the item at the candidate's position.
///
/// The identifier is re-read from the live page rather than trusted from the
/// candidate; the caller compares the two to detect a reflow. Returns
/// `Ok(None)` when the node is gone or its identifier is no longer parsable.
pub fn extract_snapshot(
    browser: &dyn Browser,
    candidate: &Candidate,
    rule: &ExtractRule,
) -> Result<Option<ItemSnapshot>> {
    let Some(id) = browser
        .identifier_at(candidate.position)
        .context("re-read item identifier")?
    else {
        debug!(id = %candidate.id, "identifier no longer parsable");
        return Ok(None);
    };

    let fragments = browser
        .text_fragments(candidate.position)
        .context("read text fragments")?;
    let author = browser
        .author(candidate.position)
        .context("read item author")?;
    let bounding_box = browser
        .bounding_box(candidate.position)
        .context("read bounding box")?;

    let text = assemble_text(author.as_deref(), &fragments, rule.min_fragment_chars);
    debug!(id = %id, chars = text.chars().count(), "captured snapshot");

    Ok(Some(ItemSnapshot {
        id,
        position: candidate.position,
        text,
        author,
        bounding_box,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FeedPosition, ItemId};
    use crate::test_support::{ScriptedBrowser, feed_item};

    fn rule() -> ExtractRule {
        ExtractRule {
            min_fragment_chars: 20,
        }
    }

    fn candidate(id: &str, position: usize) -> Candidate {
        Candidate {
            id: ItemId::new(id),
            position: FeedPosition(position),
        }
    }

    #[test]
    fn snapshot_carries_assembled_text_and_author() {
        let browser = ScriptedBrowser::new(vec![feed_item("urn:item:1", 100.0)]);
        let snapshot = extract_snapshot(&browser, &candidate("urn:item:1", 0), &rule())
            .expect("extract")
            .expect("snapshot");

        assert_eq!(snapshot.id, ItemId::new("urn:item:1"));
        assert!(snapshot.text.starts_with("Jordan Rivera\n"));
        assert!(snapshot.text.contains("columnar store"));
        assert!(snapshot.bounding_box.is_some());
    }

    #[test]
    fn missing_identifier_yields_none() {
        let mut item = feed_item("urn:item:1", 100.0);
        item.identifier = None;
        let browser = ScriptedBrowser::new(vec![item]);
        let snapshot =
            extract_snapshot(&browser, &candidate("urn:item:1", 0), &rule()).expect("extract");
        assert_eq!(snapshot, None);
    }

    #[test]
    fn reflowed_position_reports_the_new_identifier() {
        let browser = ScriptedBrowser::new(vec![feed_item("urn:item:old", 100.0)]);
        browser.reflow_after(0, "urn:item:new");
        let snapshot = extract_snapshot(&browser, &candidate("urn:item:old", 0), &rule())
            .expect("extract")
            .expect("snapshot");
        assert_eq!(snapshot.id, ItemId::new("urn:item:new"));
    }
}

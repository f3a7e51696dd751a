//! Deterministic candidate selection over rendered feed items.

use crate::core::types::{FeedPosition, ItemId, RenderedItem};

/// Selection thresholds for the near-viewport band.
#[derive(Debug, Clone, Copy)]
pub struct LocatorRule {
    /// Items whose top edge lies within `[0, near_band_px]` qualify.
    pub near_band_px: f64,
    /// Filters out collapsed/placeholder nodes.
    pub min_item_height_px: f64,
}

/// A located feed item: the next item to be "read".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: ItemId,
    pub position: FeedPosition,
}

/// Pick the qualifying item closest to the top of the viewport.
///
/// Qualifying means: a parsable identifier, top edge within the near band,
/// and rendered height above the minimum. Returns `None` when nothing
/// qualifies (caller scrolls and retries).
pub fn topmost_candidate(items: &[RenderedItem], rule: &LocatorRule) -> Option<Candidate> {
    items
        .iter()
        .filter(|item| item.identifier.is_some())
        .filter(|item| item.top_px >= 0.0 && item.top_px <= rule.near_band_px)
        .filter(|item| item.height_px > rule.min_item_height_px)
        .min_by(|a, b| a.top_px.total_cmp(&b.top_px))
        .map(|item| Candidate {
            id: ItemId::new(item.identifier.clone().unwrap_or_default()),
            position: item.position,
        })
}

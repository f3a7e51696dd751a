//! Shared deterministic types for the engagement loop.
//!
//! These types define stable contracts between components. They carry no
//! references to the live page; a snapshot is immutable once captured and is
//! re-fetched rather than patched when the feed is suspected to have mutated.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, stable identifier extracted from platform markup, unique per feed
/// item for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle used to re-resolve a rendered item on the live page.
///
/// Positions are only meaningful until the feed re-renders; every use is
/// guarded by an attach check or an identifier re-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedPosition(pub usize);

/// Viewport-relative bounding box of a rendered item, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One rendered feed item as reported by the browser capability.
///
/// `identifier` is `None` when the platform markup carried no parsable id;
/// such nodes are never candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedItem {
    pub identifier: Option<String>,
    pub position: FeedPosition,
    pub top_px: f64,
    pub height_px: f64,
}

/// Immutable capture of one feed item, created per processing attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub position: FeedPosition,
    pub text: String,
    pub author: Option<String>,
    pub bounding_box: Option<BoundingBox>,
}

/// Which path produced an engage/skip decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    /// The remote classifier answered.
    Model,
    /// The classifier failed; the local keyword heuristic answered.
    Heuristic,
}

/// Advisory engage/skip decision for one item. Consumed immediately, never
/// persisted; the rate ceiling is enforced by the session, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub engage: bool,
    pub source: DecisionSource,
}

/// Increment-only run counters, owned exclusively by the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Items that passed the minimum-length validation gate.
    pub items_processed: u64,
    /// Engagements that executed successfully.
    pub engagements_performed: u64,
}

impl RunCounters {
    /// Observed engagement ratio. Reads `0.0` before any item is processed.
    pub fn observed_ratio(&self) -> f64 {
        if self.items_processed == 0 {
            return 0.0;
        }
        self.engagements_performed as f64 / self.items_processed as f64
    }
}

/// Why an item left the pipeline without an engagement.
///
/// Every variant is an expected, recoverable outcome; the run continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The identifier was already observed this run.
    AlreadySeen,
    /// The node detached from the document between steps.
    Detached,
    /// The snapshot could not be captured (node gone, id unparsable).
    ExtractionFailed,
    /// The assembled text fell below the minimum length gate.
    TextTooShort,
    /// The decision engine said skip.
    Declined(DecisionSource),
    /// The observed ratio already met the configured ceiling.
    RateLimited,
    /// The identifier changed between decision and execution.
    FeedReflow,
    /// The UI flow failed; the item is abandoned without retry.
    ExecutionFailed(String),
    /// Dry run: the item would have been engaged.
    DryRun,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadySeen => f.write_str("already seen"),
            Self::Detached => f.write_str("node detached"),
            Self::ExtractionFailed => f.write_str("extraction failed"),
            Self::TextTooShort => f.write_str("text too short"),
            Self::Declined(DecisionSource::Model) => f.write_str("declined by model"),
            Self::Declined(DecisionSource::Heuristic) => f.write_str("declined by heuristic"),
            Self::RateLimited => f.write_str("rate ceiling reached"),
            Self::FeedReflow => f.write_str("feed reflow"),
            Self::ExecutionFailed(detail) => write!(f, "execution failed: {detail}"),
            Self::DryRun => f.write_str("dry run (would engage)"),
        }
    }
}

/// Terminal outcome of one examined item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// The comment was submitted.
    Engaged { comment: String },
    Skipped(SkipReason),
}

/// Report for one examined item, delivered through the session callback.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    pub id: ItemId,
    pub outcome: ItemOutcome,
}

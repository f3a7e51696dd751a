//! Browser automation capability.
//!
//! The [`Browser`] trait decouples the engagement loop from the actual
//! page-automation backend (currently a driver subprocess, see
//! [`driver`](crate::io::driver)). The controller depends only on this
//! abstraction; tests use a scripted browser that answers from an in-memory
//! feed without touching a page.
//!
//! All methods take `&self`; implementations use interior mutability. The
//! loop is single-threaded and strictly sequential, so the page is never
//! touched by more than one iteration at a time.

use anyhow::Result;

use crate::core::types::{BoundingBox, FeedPosition, ItemId, RenderedItem};

/// Read and act on the live feed page.
pub trait Browser {
    /// All currently rendered feed items (markup-attached, not necessarily
    /// scrolled to), with viewport geometry. Read-only.
    fn rendered_items(&self) -> Result<Vec<RenderedItem>>;

    /// Re-resolve the identifier of the item at `position`. `None` when the
    /// node is gone or carries no parsable identifier.
    fn identifier_at(&self, position: FeedPosition) -> Result<Option<ItemId>>;

    /// Raw text fragments of the item at `position`, in document order.
    fn text_fragments(&self, position: FeedPosition) -> Result<Vec<String>>;

    /// Author display name of the item at `position`, if present.
    fn author(&self, position: FeedPosition) -> Result<Option<String>>;

    /// Whether the node at `position` is still connected to the document.
    fn is_attached(&self, position: FeedPosition) -> Result<bool>;

    /// Click a "see more"-style control inside the item, if one exists.
    /// Returns whether a control was found and clicked.
    fn click_expander(&self, position: FeedPosition) -> Result<bool>;

    /// Viewport-relative bounding box of the item at `position`.
    fn bounding_box(&self, position: FeedPosition) -> Result<Option<BoundingBox>>;

    /// Capture the region as PNG bytes.
    fn screenshot(&self, bbox: &BoundingBox) -> Result<Vec<u8>>;

    /// Perform a UI action described in natural language. Non-deterministic
    /// by nature; the instruction carries author/content hints so the agent
    /// targets the intended item.
    fn act(&self, instruction: &str) -> Result<()>;

    /// Scroll the feed by `delta_px` (positive scrolls down).
    fn scroll(&self, delta_px: i64) -> Result<()>;

    /// Whether any comment-input surface is currently open on the page.
    fn composer_open(&self) -> Result<bool>;

    /// Current page URL, for reporting.
    fn current_url(&self) -> Result<String>;
}

//! Test-only scripted collaborators for the engagement loop.
//!
//! [`ScriptedBrowser`] answers the [`Browser`] capability from an in-memory
//! feed; [`ScriptedModel`] returns predetermined replies. Neither spawns a
//! process, so step and session behavior is testable deterministically.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::core::types::{BoundingBox, FeedPosition, ItemId, RenderedItem};
use crate::io::browser::Browser;
use crate::io::model::{Model, ModelRequest};

/// One scripted feed item. Position is the item's index in the feed vec.
#[derive(Debug, Clone)]
pub struct FakeItem {
    pub identifier: Option<String>,
    pub top_px: f64,
    pub height_px: f64,
    pub fragments: Vec<String>,
    /// Fragments after a successful expander click, if the item has one.
    pub expanded_fragments: Option<Vec<String>>,
    pub author: Option<String>,
    pub attached: bool,
}

/// Create a readable feed item with a long-enough body at the given offset.
pub fn feed_item(identifier: &str, top_px: f64) -> FakeItem {
    FakeItem {
        identifier: Some(identifier.to_string()),
        top_px,
        height_px: 240.0,
        fragments: vec![
            "We migrated our ingest pipeline to a columnar store last month and throughput doubled."
                .to_string(),
        ],
        expanded_fragments: None,
        author: Some("Jordan Rivera".to_string()),
        attached: true,
    }
}

/// Create an item whose assembled text falls below any reasonable length gate.
pub fn short_item(identifier: &str, top_px: f64) -> FakeItem {
    FakeItem {
        fragments: vec!["Nice!".to_string()],
        author: None,
        ..feed_item(identifier, top_px)
    }
}

/// Scripted reflow: after `after_reads` identifier re-reads, every position
/// resolves to `new_id` instead of the scripted item.
#[derive(Debug, Clone)]
struct Reflow {
    after_reads: usize,
    new_id: String,
}

/// In-memory [`Browser`] with recorded actions.
#[derive(Debug, Default)]
pub struct ScriptedBrowser {
    items: RefCell<Vec<FakeItem>>,
    acts: RefCell<Vec<String>>,
    scrolls: RefCell<Vec<i64>>,
    composer_open: Cell<bool>,
    identifier_reads: Cell<usize>,
    reflow: RefCell<Option<Reflow>>,
}

impl ScriptedBrowser {
    pub fn new(items: Vec<FakeItem>) -> Self {
        Self {
            items: RefCell::new(items),
            ..Self::default()
        }
    }

    /// After `after_reads` calls to `identifier_at`, re-reads resolve to
    /// `new_id` (the feed re-rendered under the controller).
    pub fn reflow_after(&self, after_reads: usize, new_id: &str) {
        *self.reflow.borrow_mut() = Some(Reflow {
            after_reads,
            new_id: new_id.to_string(),
        });
    }

    /// Mark the page as already having an open comment surface.
    pub fn set_composer_open(&self, open: bool) {
        self.composer_open.set(open);
    }

    /// UI instructions performed so far, in order.
    pub fn acts(&self) -> Vec<String> {
        self.acts.borrow().clone()
    }

    /// Scroll deltas performed so far, in order.
    pub fn scrolls(&self) -> Vec<i64> {
        self.scrolls.borrow().clone()
    }

    fn item<T>(&self, position: FeedPosition, f: impl FnOnce(&FakeItem) -> T) -> Result<T> {
        let items = self.items.borrow();
        let item = items
            .get(position.0)
            .ok_or_else(|| anyhow!("no scripted item at position {}", position.0))?;
        Ok(f(item))
    }
}

impl Browser for ScriptedBrowser {
    fn rendered_items(&self) -> Result<Vec<RenderedItem>> {
        Ok(self
            .items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, item)| RenderedItem {
                identifier: item.identifier.clone(),
                position: FeedPosition(i),
                top_px: item.top_px,
                height_px: item.height_px,
            })
            .collect())
    }

    fn identifier_at(&self, position: FeedPosition) -> Result<Option<ItemId>> {
        let reads = self.identifier_reads.get() + 1;
        self.identifier_reads.set(reads);
        if let Some(reflow) = self.reflow.borrow().as_ref()
            && reads > reflow.after_reads
        {
            return Ok(Some(ItemId::new(reflow.new_id.clone())));
        }
        self.item(position, |item| {
            item.identifier.clone().map(ItemId::new)
        })
    }

    fn text_fragments(&self, position: FeedPosition) -> Result<Vec<String>> {
        self.item(position, |item| item.fragments.clone())
    }

    fn author(&self, position: FeedPosition) -> Result<Option<String>> {
        self.item(position, |item| item.author.clone())
    }

    fn is_attached(&self, position: FeedPosition) -> Result<bool> {
        let items = self.items.borrow();
        Ok(items.get(position.0).is_some_and(|item| item.attached))
    }

    fn click_expander(&self, position: FeedPosition) -> Result<bool> {
        let mut items = self.items.borrow_mut();
        let item = items
            .get_mut(position.0)
            .ok_or_else(|| anyhow!("no scripted item at position {}", position.0))?;
        match item.expanded_fragments.take() {
            Some(expanded) => {
                item.fragments = expanded;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn bounding_box(&self, position: FeedPosition) -> Result<Option<BoundingBox>> {
        self.item(position, |item| {
            Some(BoundingBox {
                x: 0.0,
                y: item.top_px,
                width: 600.0,
                height: item.height_px,
            })
        })
    }

    fn screenshot(&self, _bbox: &BoundingBox) -> Result<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    fn act(&self, instruction: &str) -> Result<()> {
        self.acts.borrow_mut().push(instruction.to_string());
        Ok(())
    }

    fn scroll(&self, delta_px: i64) -> Result<()> {
        self.scrolls.borrow_mut().push(delta_px);
        for item in self.items.borrow_mut().iter_mut() {
            item.top_px -= delta_px as f64;
        }
        Ok(())
    }

    fn composer_open(&self) -> Result<bool> {
        Ok(self.composer_open.get())
    }

    fn current_url(&self) -> Result<String> {
        Ok("https://feed.example/home".to_string())
    }
}

/// Scripted [`Model`]: pops one reply per call, recording prompts.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: RefCell<VecDeque<Result<String, String>>>,
    prompts: RefCell<Vec<String>>,
    images_seen: Cell<usize>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a raw successful reply.
    pub fn push_reply(&self, raw: &str) {
        self.replies.borrow_mut().push_back(Ok(raw.to_string()));
    }

    /// Script a failed call (timeout, crash, refusal).
    pub fn push_failure(&self, message: &str) {
        self.replies
            .borrow_mut()
            .push_back(Err(message.to_string()));
    }

    /// Script a schema-conforming classification reply.
    pub fn push_decision(&self, engage: bool) {
        self.push_reply(&format!(r#"{{"engage": {engage}}}"#));
    }

    /// Script a schema-conforming comment reply.
    pub fn push_comment(&self, comment: &str) {
        self.push_reply(&format!(
            r#"{{"comment": {}}}"#,
            serde_json::Value::String(comment.to_string())
        ));
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    /// How many calls carried an image attachment.
    pub fn images_seen(&self) -> usize {
        self.images_seen.get()
    }

    /// How many scripted replies remain unconsumed.
    pub fn remaining(&self) -> usize {
        self.replies.borrow().len()
    }
}

impl Model for ScriptedModel {
    fn complete(&self, request: &ModelRequest) -> Result<String> {
        self.prompts.borrow_mut().push(request.prompt.clone());
        if request.image_png.is_some() {
            self.images_seen.set(self.images_seen.get() + 1);
        }
        match self.replies.borrow_mut().pop_front() {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(message)) => Err(anyhow!("{message}")),
            None => Err(anyhow!("model script exhausted")),
        }
    }
}

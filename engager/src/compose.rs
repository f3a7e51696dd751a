//! Tiered comment generation.
//!
//! Three tiers, attempted in order, so generation is total:
//!
//! 1. Multimodal: item screenshot plus text prefix.
//! 2. Text-only: text prefix alone.
//! 3. Configured fallback comment.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

use crate::core::text::char_prefix;
use crate::core::types::ItemSnapshot;
use crate::io::browser::Browser;
use crate::io::model::{Model, ModelRequest, parse_validated};
use crate::io::prompt::PromptEngine;

const COMMENT_SCHEMA: &str = include_str!("../schemas/comment_output.schema.json");

/// Parameters for the generation calls.
#[derive(Debug, Clone)]
pub struct ComposeConfig {
    /// Item-text prefix length sent to the model.
    pub prefix_chars: usize,
    /// Per-call model timeout.
    pub timeout: Duration,
    /// Tier-3 comment used when both model tiers fail.
    pub fallback_comment: String,
}

/// Which tier produced the comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentTier {
    Multimodal,
    TextOnly,
    Fallback,
}

/// A generated comment ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedComment {
    pub text: String,
    pub tier: CommentTier,
}

/// Generate a comment for the snapshot. Never fails: tier failures degrade
/// to the next tier, and tier 3 is a constant.
pub fn compose_comment(
    model: &dyn Model,
    engine: &PromptEngine,
    browser: &dyn Browser,
    snapshot: &ItemSnapshot,
    config: &ComposeConfig,
) -> ComposedComment {
    match compose_multimodal(model, engine, browser, snapshot, config) {
        Ok(text) => {
            debug!(id = %snapshot.id, "multimodal comment generated");
            return ComposedComment {
                text,
                tier: CommentTier::Multimodal,
            };
        }
        Err(err) => warn!(id = %snapshot.id, "multimodal tier failed: {err:#}"),
    }

    match compose_text_only(model, engine, snapshot, config) {
        Ok(text) => {
            debug!(id = %snapshot.id, "text-only comment generated");
            return ComposedComment {
                text,
                tier: CommentTier::TextOnly,
            };
        }
        Err(err) => warn!(id = %snapshot.id, "text-only tier failed: {err:#}"),
    }

    ComposedComment {
        text: config.fallback_comment.clone(),
        tier: CommentTier::Fallback,
    }
}

fn compose_multimodal(
    model: &dyn Model,
    engine: &PromptEngine,
    browser: &dyn Browser,
    snapshot: &ItemSnapshot,
    config: &ComposeConfig,
) -> Result<String> {
    let bbox = snapshot
        .bounding_box
        .as_ref()
        .ok_or_else(|| anyhow!("snapshot has no bounding box"))?;
    let image = browser.screenshot(bbox).context("capture item screenshot")?;
    request_comment(model, engine, snapshot, config, Some(image), true)
}

fn compose_text_only(
    model: &dyn Model,
    engine: &PromptEngine,
    snapshot: &ItemSnapshot,
    config: &ComposeConfig,
) -> Result<String> {
    request_comment(model, engine, snapshot, config, None, false)
}

fn request_comment(
    model: &dyn Model,
    engine: &PromptEngine,
    snapshot: &ItemSnapshot,
    config: &ComposeConfig,
    image_png: Option<Vec<u8>>,
    screenshot: bool,
) -> Result<String> {
    let prefix = char_prefix(&snapshot.text, config.prefix_chars);
    let prompt = engine.render_comment(prefix, snapshot.author.as_deref(), screenshot)?;
    let raw = model.complete(&ModelRequest {
        prompt,
        image_png,
        output_schema: Some(COMMENT_SCHEMA),
        timeout: config.timeout,
    })?;
    let value = parse_validated(&raw, COMMENT_SCHEMA)?;
    let comment = value["comment"].as_str().unwrap_or_default().trim();
    if comment.is_empty() {
        return Err(anyhow!("model returned a blank comment"));
    }
    Ok(comment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BoundingBox, FeedPosition, ItemId};
    use crate::test_support::{ScriptedBrowser, ScriptedModel, feed_item};

    fn snapshot() -> ItemSnapshot {
        ItemSnapshot {
            id: ItemId::new("urn:item:1"),
            position: FeedPosition(0),
            text: "A detailed post about incremental compilation.".to_string(),
            author: Some("Jordan Rivera".to_string()),
            bounding_box: Some(BoundingBox {
                x: 0.0,
                y: 100.0,
                width: 600.0,
                height: 240.0,
            }),
        }
    }

    fn config() -> ComposeConfig {
        ComposeConfig {
            prefix_chars: 500,
            timeout: Duration::from_secs(5),
            fallback_comment: "Thanks for sharing.".to_string(),
        }
    }

    #[test]
    fn first_tier_uses_the_screenshot() {
        let model = ScriptedModel::new();
        model.push_comment("Great writeup, the dependency tracking section was clarifying.");
        let browser = ScriptedBrowser::new(vec![feed_item("urn:item:1", 100.0)]);

        let composed = compose_comment(&model, &PromptEngine::new(), &browser, &snapshot(), &config());
        assert_eq!(composed.tier, CommentTier::Multimodal);
        assert_eq!(model.images_seen(), 1);
        assert!(composed.text.contains("dependency tracking"));
    }

    #[test]
    fn failed_multimodal_degrades_to_text_only() {
        let model = ScriptedModel::new();
        model.push_failure("model timed out");
        model.push_comment("Interesting tradeoff, thanks for writing it up.");
        let browser = ScriptedBrowser::new(vec![feed_item("urn:item:1", 100.0)]);

        let composed = compose_comment(&model, &PromptEngine::new(), &browser, &snapshot(), &config());
        assert_eq!(composed.tier, CommentTier::TextOnly);
        assert_eq!(model.images_seen(), 1);
    }

    #[test]
    fn missing_bounding_box_skips_the_multimodal_tier() {
        let model = ScriptedModel::new();
        model.push_comment("Nice summary of the failure modes.");
        let browser = ScriptedBrowser::new(vec![feed_item("urn:item:1", 100.0)]);
        let mut snapshot = snapshot();
        snapshot.bounding_box = None;

        let composed = compose_comment(&model, &PromptEngine::new(), &browser, &snapshot, &config());
        assert_eq!(composed.tier, CommentTier::TextOnly);
        assert_eq!(model.images_seen(), 0);
    }

    #[test]
    fn both_model_tiers_failing_yields_the_fallback() {
        let model = ScriptedModel::new();
        model.push_failure("model timed out");
        model.push_failure("model timed out");
        let browser = ScriptedBrowser::new(vec![feed_item("urn:item:1", 100.0)]);

        let composed = compose_comment(&model, &PromptEngine::new(), &browser, &snapshot(), &config());
        assert_eq!(composed.tier, CommentTier::Fallback);
        assert_eq!(composed.text, "Thanks for sharing.");
    }

    #[test]
    fn blank_comment_counts_as_a_tier_failure() {
        let model = ScriptedModel::new();
        model.push_comment("   ");
        model.push_comment("A substantive reply.");
        let browser = ScriptedBrowser::new(vec![feed_item("urn:item:1", 100.0)]);

        let composed = compose_comment(&model, &PromptEngine::new(), &browser, &snapshot(), &config());
        assert_eq!(composed.tier, CommentTier::TextOnly);
        assert_eq!(composed.text, "A substantive reply.");
    }
}

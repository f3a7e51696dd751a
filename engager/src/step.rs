//! Orchestration for one examined feed item.
//!
//! A step runs the full pipeline for the single topmost candidate: locate,
//! blacklist, attach check, extract, length gate, decide, rate gate,
//! compose, execute. Expected external failures skip the item and the run
//! continues; an [`InvariantViolation`] aborts the step with an error.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::compose::{ComposeConfig, compose_comment};
use crate::core::blacklist::Blacklist;
use crate::core::invariants::{InvariantKind, InvariantViolation};
use crate::core::locator::{Candidate, LocatorRule};
use crate::core::rate::{RateCeiling, engagement_allowed};
use crate::core::types::{
    ItemOutcome, ItemReport, ItemSnapshot, RunCounters, SkipReason,
};
use crate::decide::{DecideConfig, decide};
use crate::execute::{ExecuteConfig, ReflowError, execute_engagement};
use crate::extract::{ExtractRule, extract_snapshot};
use crate::io::browser::Browser;
use crate::io::config::EngagerConfig;
use crate::io::model::Model;
use crate::io::prompt::PromptEngine;
use crate::locate::locate_candidate;

/// All per-item pipeline parameters, derived from [`EngagerConfig`].
#[derive(Debug, Clone)]
pub struct StepConfig {
    pub rate_ceiling: RateCeiling,
    /// Items with fewer assembled characters never reach the decision engine.
    pub min_text_chars: usize,
    pub locator: LocatorRule,
    pub extract: ExtractRule,
    pub decide: DecideConfig,
    pub compose: ComposeConfig,
    pub execute: ExecuteConfig,
    /// Delay after expanding truncated text.
    pub settle: Duration,
    /// Run the pipeline up to the decision but never act on the page.
    pub dry_run: bool,
}

impl StepConfig {
    pub fn from_run(config: &EngagerConfig, dry_run: bool) -> Result<Self> {
        let model_timeout = Duration::from_secs(config.model.timeout_secs);
        Ok(Self {
            rate_ceiling: RateCeiling::new(config.rate_ceiling)?,
            min_text_chars: config.min_text_chars,
            locator: LocatorRule {
                near_band_px: config.near_band_px,
                min_item_height_px: config.min_item_height_px,
            },
            extract: ExtractRule {
                min_fragment_chars: config.min_fragment_chars,
            },
            decide: DecideConfig {
                keyword: config.keyword.clone(),
                prefix_chars: config.decision_prefix_chars,
                timeout: model_timeout,
            },
            compose: ComposeConfig {
                prefix_chars: config.comment_prefix_chars,
                timeout: model_timeout,
                fallback_comment: config.fallback_comment.clone(),
            },
            execute: ExecuteConfig {
                settle: Duration::from_millis(config.settle_ms),
            },
            settle: Duration::from_millis(config.settle_ms),
            dry_run,
        })
    }
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Nothing qualified in the near band; the session scrolls and retries.
    NoCandidate,
    /// One item was examined to a terminal outcome.
    Examined(ItemReport),
}

/// Examine the topmost candidate, if any.
///
/// The rate gate reads the counters as they stood before this item was
/// counted, so the ceiling lags by at most one item and the first item of a
/// run is always eligible. The decision engine runs even when the gate will
/// veto, so every processed item carries a real decision in its report.
pub fn run_step(
    browser: &dyn Browser,
    model: &dyn Model,
    engine: &PromptEngine,
    blacklist: &mut Blacklist,
    counters: &mut RunCounters,
    config: &StepConfig,
) -> Result<StepOutcome> {
    let candidate = match locate_candidate(browser, &config.locator) {
        Ok(Some(candidate)) => candidate,
        Ok(None) => return Ok(StepOutcome::NoCandidate),
        Err(err) => {
            warn!("locate failed: {err:#}");
            return Ok(StepOutcome::NoCandidate);
        }
    };

    if blacklist.contains(&candidate.id) {
        return Ok(skipped(&candidate, SkipReason::AlreadySeen));
    }
    blacklist.observe(candidate.id.clone())?;

    if !browser
        .is_attached(candidate.position)
        .context("check candidate attachment")?
    {
        return Ok(skipped(&candidate, SkipReason::Detached));
    }

    let snapshot = match capture(browser, &candidate, config) {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return Ok(skipped(&candidate, SkipReason::ExtractionFailed)),
        Err(err) => {
            warn!(id = %candidate.id, "extraction failed: {err:#}");
            return Ok(skipped(&candidate, SkipReason::ExtractionFailed));
        }
    };
    if snapshot.id != candidate.id {
        debug!(expected = %candidate.id, found = %snapshot.id, "reflow during extraction");
        return Ok(skipped(&candidate, SkipReason::FeedReflow));
    }

    if snapshot.text.chars().count() < config.min_text_chars {
        // Below the length gate the item is not "processed": it carries no
        // decision and does not move the observed ratio.
        return Ok(skipped(&candidate, SkipReason::TextTooShort));
    }

    // The gate reads pre-increment counters; the current item is excluded
    // from its own denominator.
    let gate_allows = engagement_allowed(*counters, config.rate_ceiling);
    counters.items_processed += 1;

    let decision = decide(model, engine, &snapshot, &config.decide);
    if !decision.engage {
        return Ok(skipped(&candidate, SkipReason::Declined(decision.source)));
    }
    if !gate_allows {
        return Ok(skipped(&candidate, SkipReason::RateLimited));
    }
    if config.dry_run {
        return Ok(skipped(&candidate, SkipReason::DryRun));
    }

    // Preconditions re-checked before any generation spend: the identifier
    // must still match, and no composer may already be open.
    let found = browser
        .identifier_at(candidate.position)
        .context("re-verify candidate before composing")?;
    if found.as_ref() != Some(&candidate.id) {
        return Ok(skipped(&candidate, SkipReason::FeedReflow));
    }
    if browser.composer_open().context("check composer state")? {
        return Err(InvariantViolation::new(
            InvariantKind::ComposerAlreadyOpen,
            format!("before engaging {}", candidate.id),
        )
        .into());
    }

    let composed = compose_comment(model, engine, browser, &snapshot, &config.compose);

    match execute_engagement(browser, &snapshot, &composed.text, &config.execute) {
        Ok(()) => {
            counters.engagements_performed += 1;
            Ok(StepOutcome::Examined(ItemReport {
                id: candidate.id,
                outcome: ItemOutcome::Engaged {
                    comment: composed.text,
                },
            }))
        }
        Err(err) if err.downcast_ref::<ReflowError>().is_some() => {
            warn!(id = %candidate.id, "reflow at execution: {err:#}");
            Ok(skipped(&candidate, SkipReason::FeedReflow))
        }
        Err(err) => {
            warn!(id = %candidate.id, "execution failed: {err:#}");
            Ok(skipped(&candidate, SkipReason::ExecutionFailed(format!("{err:#}"))))
        }
    }
}

/// Extract, expand truncated text if an expander exists, then re-extract so
/// the snapshot reflects the full text.
fn capture(
    browser: &dyn Browser,
    candidate: &Candidate,
    config: &StepConfig,
) -> Result<Option<ItemSnapshot>> {
    let Some(provisional) = extract_snapshot(browser, candidate, &config.extract)? else {
        return Ok(None);
    };
    if provisional.id != candidate.id {
        return Ok(Some(provisional));
    }

    let expanded = match browser.click_expander(candidate.position) {
        Ok(expanded) => expanded,
        Err(err) => {
            warn!(id = %candidate.id, "expander click failed: {err:#}");
            false
        }
    };
    // The attempt itself may have disturbed the item, so settle either way.
    settle(config.settle);
    if !expanded {
        return Ok(Some(provisional));
    }

    // Refresh after expansion; fall back to the provisional snapshot if the
    // re-read no longer resolves to the same item.
    match extract_snapshot(browser, candidate, &config.extract) {
        Ok(Some(refreshed)) if refreshed.id == candidate.id => Ok(Some(refreshed)),
        Ok(_) => Ok(Some(provisional)),
        Err(err) => {
            warn!(id = %candidate.id, "re-extraction failed: {err:#}");
            Ok(Some(provisional))
        }
    }
}

fn skipped(candidate: &Candidate, reason: SkipReason) -> StepOutcome {
    debug!(id = %candidate.id, %reason, "item skipped");
    StepOutcome::Examined(ItemReport {
        id: candidate.id.clone(),
        outcome: ItemOutcome::Skipped(reason),
    })
}

fn settle(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DecisionSource, ItemId};
    use crate::test_support::{FakeItem, ScriptedBrowser, ScriptedModel, feed_item, short_item};

    fn config() -> StepConfig {
        let run = EngagerConfig {
            settle_ms: 0,
            ..EngagerConfig::default()
        };
        StepConfig::from_run(&run, false).expect("step config")
    }

    fn engaged_id(outcome: &StepOutcome) -> &ItemId {
        match outcome {
            StepOutcome::Examined(report) => &report.id,
            StepOutcome::NoCandidate => panic!("expected an examined item"),
        }
    }

    fn skip_reason(outcome: &StepOutcome) -> &SkipReason {
        match outcome {
            StepOutcome::Examined(ItemReport {
                outcome: ItemOutcome::Skipped(reason),
                ..
            }) => reason,
            other => panic!("expected a skip, got {other:?}"),
        }
    }

    /// Verifies the full engage path: model says yes, a comment is composed
    /// and submitted, and both counters advance.
    #[test]
    fn step_engages_and_counts() {
        let browser = ScriptedBrowser::new(vec![feed_item("urn:item:1", 100.0)]);
        let model = ScriptedModel::new();
        model.push_decision(true);
        model.push_comment("Doubling throughput from a storage swap is impressive.");

        let mut blacklist = Blacklist::new();
        let mut counters = RunCounters::default();
        let outcome = run_step(
            &browser,
            &model,
            &PromptEngine::new(),
            &mut blacklist,
            &mut counters,
            &config(),
        )
        .expect("step");

        assert_eq!(engaged_id(&outcome), &ItemId::new("urn:item:1"));
        assert!(matches!(
            outcome,
            StepOutcome::Examined(ItemReport {
                outcome: ItemOutcome::Engaged { .. },
                ..
            })
        ));
        assert_eq!(counters.items_processed, 1);
        assert_eq!(counters.engagements_performed, 1);
        assert!(blacklist.contains(&ItemId::new("urn:item:1")));
        assert_eq!(browser.acts().len(), 4);
    }

    /// Verifies an already-observed identifier skips without re-observation
    /// and without touching the counters.
    #[test]
    fn already_seen_identifier_is_skipped() {
        let browser = ScriptedBrowser::new(vec![feed_item("urn:item:1", 100.0)]);
        let model = ScriptedModel::new();
        let mut blacklist = Blacklist::new();
        blacklist
            .observe(ItemId::new("urn:item:1"))
            .expect("observe");
        let mut counters = RunCounters::default();

        let outcome = run_step(
            &browser,
            &model,
            &PromptEngine::new(),
            &mut blacklist,
            &mut counters,
            &config(),
        )
        .expect("step");

        assert_eq!(skip_reason(&outcome), &SkipReason::AlreadySeen);
        assert_eq!(counters.items_processed, 0);
        assert!(model.prompts().is_empty(), "no model call for a seen item");
    }

    /// Verifies short text skips before the decision engine and does not
    /// count as processed.
    #[test]
    fn short_text_skips_without_processing() {
        let browser = ScriptedBrowser::new(vec![short_item("urn:item:1", 100.0)]);
        let model = ScriptedModel::new();
        let mut blacklist = Blacklist::new();
        let mut counters = RunCounters::default();

        let outcome = run_step(
            &browser,
            &model,
            &PromptEngine::new(),
            &mut blacklist,
            &mut counters,
            &config(),
        )
        .expect("step");

        assert_eq!(skip_reason(&outcome), &SkipReason::TextTooShort);
        assert_eq!(counters.items_processed, 0);
        assert!(model.prompts().is_empty());
        assert!(
            blacklist.contains(&ItemId::new("urn:item:1")),
            "located identifiers are observed even when skipped"
        );
    }

    /// Verifies the rate gate overrides an engage decision: the decision
    /// engine still runs, but no UI action happens.
    #[test]
    fn rate_gate_overrides_engage_decision() {
        let browser = ScriptedBrowser::new(vec![feed_item("urn:item:2", 100.0)]);
        let model = ScriptedModel::new();
        model.push_decision(true);

        let mut blacklist = Blacklist::new();
        // One item processed, one engaged: ratio 1.0 meets any ceiling.
        let mut counters = RunCounters {
            items_processed: 1,
            engagements_performed: 1,
        };

        let outcome = run_step(
            &browser,
            &model,
            &PromptEngine::new(),
            &mut blacklist,
            &mut counters,
            &config(),
        )
        .expect("step");

        assert_eq!(skip_reason(&outcome), &SkipReason::RateLimited);
        assert_eq!(model.prompts().len(), 1, "decision engine still consulted");
        assert_eq!(counters.items_processed, 2);
        assert_eq!(counters.engagements_performed, 1);
        assert!(browser.acts().is_empty());
    }

    /// Verifies a reflow between decision and generation skips the item
    /// without spending a generation call.
    #[test]
    fn reflow_before_composing_skips_without_generation() {
        let browser = ScriptedBrowser::new(vec![feed_item("urn:item:1", 100.0)]);
        let model = ScriptedModel::new();
        model.push_decision(true);
        model.push_comment("never sent");
        // First re-read (extraction) still matches; the pre-compose
        // re-verification sees the new feed.
        browser.reflow_after(1, "urn:item:reflowed");

        let mut blacklist = Blacklist::new();
        let mut counters = RunCounters::default();

        let outcome = run_step(
            &browser,
            &model,
            &PromptEngine::new(),
            &mut blacklist,
            &mut counters,
            &config(),
        )
        .expect("step");

        assert_eq!(skip_reason(&outcome), &SkipReason::FeedReflow);
        assert_eq!(model.remaining(), 1, "comment reply never consumed");
        assert!(browser.acts().is_empty());
        assert_eq!(counters.engagements_performed, 0);
    }

    /// Verifies an already-open composer halts the step with a violation
    /// rather than skipping.
    #[test]
    fn open_composer_is_a_run_halting_violation() {
        let browser = ScriptedBrowser::new(vec![feed_item("urn:item:1", 100.0)]);
        browser.set_composer_open(true);
        let model = ScriptedModel::new();
        model.push_decision(true);

        let mut blacklist = Blacklist::new();
        let mut counters = RunCounters::default();

        let err = run_step(
            &browser,
            &model,
            &PromptEngine::new(),
            &mut blacklist,
            &mut counters,
            &config(),
        )
        .expect_err("step should halt");

        let violation = err
            .downcast_ref::<InvariantViolation>()
            .expect("invariant violation");
        assert_eq!(violation.kind, InvariantKind::ComposerAlreadyOpen);
    }

    /// Verifies dry run stops after the decision with no page mutation.
    #[test]
    fn dry_run_reports_without_acting() {
        let browser = ScriptedBrowser::new(vec![feed_item("urn:item:1", 100.0)]);
        let model = ScriptedModel::new();
        model.push_decision(true);

        let run = EngagerConfig {
            settle_ms: 0,
            ..EngagerConfig::default()
        };
        let config = StepConfig::from_run(&run, true).expect("step config");

        let mut blacklist = Blacklist::new();
        let mut counters = RunCounters::default();
        let outcome = run_step(
            &browser,
            &model,
            &PromptEngine::new(),
            &mut blacklist,
            &mut counters,
            &config,
        )
        .expect("step");

        assert_eq!(skip_reason(&outcome), &SkipReason::DryRun);
        assert!(browser.acts().is_empty());
        assert_eq!(counters.items_processed, 1);
        assert_eq!(counters.engagements_performed, 0);
    }

    /// Verifies a declined decision from the heuristic is reported with its
    /// source.
    #[test]
    fn heuristic_decline_is_attributed() {
        let mut item = feed_item("urn:item:promo", 100.0);
        item.fragments = vec![
            "Limited time offer on our new course, use my code SAVE20 today!".to_string(),
        ];
        let browser = ScriptedBrowser::new(vec![item]);
        let model = ScriptedModel::new();
        model.push_failure("model unavailable");

        let mut blacklist = Blacklist::new();
        let mut counters = RunCounters::default();
        let outcome = run_step(
            &browser,
            &model,
            &PromptEngine::new(),
            &mut blacklist,
            &mut counters,
            &config(),
        )
        .expect("step");

        assert_eq!(
            skip_reason(&outcome),
            &SkipReason::Declined(DecisionSource::Heuristic)
        );
        assert_eq!(counters.items_processed, 1);
    }

    /// Verifies truncated items are expanded and the refreshed text feeds the
    /// decision prompt.
    #[test]
    fn expander_refreshes_snapshot_text() {
        let item = FakeItem {
            expanded_fragments: Some(vec![
                "The full story of our migration, including the rollback we had to do twice."
                    .to_string(),
            ]),
            ..feed_item("urn:item:1", 100.0)
        };
        let browser = ScriptedBrowser::new(vec![item]);
        let model = ScriptedModel::new();
        model.push_decision(false);

        let mut blacklist = Blacklist::new();
        let mut counters = RunCounters::default();
        run_step(
            &browser,
            &model,
            &PromptEngine::new(),
            &mut blacklist,
            &mut counters,
            &config(),
        )
        .expect("step");

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("rollback"), "expanded text reaches the prompt");
    }
}

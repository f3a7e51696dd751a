//! Multi-item engagement session.

use anyhow::Result;
use tracing::{info, warn};

use crate::core::blacklist::Blacklist;
use crate::core::types::{ItemReport, RunCounters};
use crate::io::browser::Browser;
use crate::io::config::EngagerConfig;
use crate::io::model::Model;
use crate::io::prompt::PromptEngine;
use crate::step::{StepConfig, StepOutcome, run_step};

/// Reason why `run_session` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStop {
    /// The configured number of items was examined.
    MaxItems,
    /// Repeated scrolling produced no readable candidates.
    FeedStalled,
}

/// Summary of a session invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    pub counters: RunCounters,
    /// Items examined to a terminal outcome (engaged or skipped).
    pub items_examined: u32,
    pub stop: SessionStop,
}

/// Run the engagement loop until `max_items` items are examined or the feed
/// stalls.
///
/// Stops immediately on any invariant violation or unrecoverable browser
/// error. `on_item` receives each item report as it completes, so callers
/// can stream progress.
pub fn run_session<B: Browser, M: Model, F: FnMut(&ItemReport)>(
    browser: &B,
    model: &M,
    config: &EngagerConfig,
    dry_run: bool,
    mut on_item: F,
) -> Result<SessionOutcome> {
    config.validate()?;
    let step_config = StepConfig::from_run(config, dry_run)?;
    let engine = PromptEngine::new();
    let mut blacklist = Blacklist::new();
    let mut counters = RunCounters::default();

    match browser.current_url() {
        Ok(url) => info!(%url, "session started"),
        Err(err) => warn!("could not read feed url: {err:#}"),
    }

    let mut items_examined = 0u32;
    let mut empty_locates = 0u32;

    while items_examined < config.max_items {
        match run_step(
            browser,
            model,
            &engine,
            &mut blacklist,
            &mut counters,
            &step_config,
        )? {
            StepOutcome::Examined(report) => {
                items_examined += 1;
                empty_locates = 0;
                on_item(&report);
            }
            StepOutcome::NoCandidate => {
                empty_locates += 1;
                if empty_locates >= config.max_empty_locates {
                    info!(empty_locates, "feed stalled");
                    return Ok(SessionOutcome {
                        counters,
                        items_examined,
                        stop: SessionStop::FeedStalled,
                    });
                }
            }
        }

        // Advance past the examined item (or into unrendered feed). Scroll
        // failures are not fatal; the stall counter bounds the retries.
        if let Err(err) = browser.scroll(config.scroll_step_px) {
            warn!("scroll failed: {err:#}");
        }
    }

    info!(
        items_examined,
        engagements = counters.engagements_performed,
        "session complete"
    );
    Ok(SessionOutcome {
        counters,
        items_examined,
        stop: SessionStop::MaxItems,
    })
}

//! Engage/skip decision for one snapshot.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use crate::core::heuristic::engage_by_heuristic;
use crate::core::text::char_prefix;
use crate::core::types::{Decision, DecisionSource, ItemSnapshot};
use crate::io::model::{Model, ModelRequest, parse_validated};
use crate::io::prompt::PromptEngine;

const DECISION_SCHEMA: &str = include_str!("../schemas/decision_output.schema.json");

/// Parameters for the classification call.
#[derive(Debug, Clone)]
pub struct DecideConfig {
    /// Optional topic keyword included in the prompt.
    pub keyword: Option<String>,
    /// Item-text prefix length sent to the model.
    pub prefix_chars: usize,
    /// Per-call model timeout.
    pub timeout: Duration,
}

/// Decide whether to engage with the snapshot. Total: when the model call
/// fails for any reason (timeout, crash, malformed output), the local
/// heuristic answers instead and the run continues.
pub fn decide(
    model: &dyn Model,
    engine: &PromptEngine,
    snapshot: &ItemSnapshot,
    config: &DecideConfig,
) -> Decision {
    match decide_by_model(model, engine, snapshot, config) {
        Ok(engage) => {
            debug!(id = %snapshot.id, engage, "model decided");
            Decision {
                engage,
                source: DecisionSource::Model,
            }
        }
        Err(err) => {
            let engage = engage_by_heuristic(&snapshot.text);
            warn!(id = %snapshot.id, engage, "classifier failed, using heuristic: {err:#}");
            Decision {
                engage,
                source: DecisionSource::Heuristic,
            }
        }
    }
}

fn decide_by_model(
    model: &dyn Model,
    engine: &PromptEngine,
    snapshot: &ItemSnapshot,
    config: &DecideConfig,
) -> Result<bool> {
    let prefix = char_prefix(&snapshot.text, config.prefix_chars);
    let prompt = engine.render_decision(prefix, config.keyword.as_deref())?;
    let raw = model.complete(&ModelRequest {
        prompt,
        image_png: None,
        output_schema: Some(DECISION_SCHEMA),
        timeout: config.timeout,
    })?;
    let value = parse_validated(&raw, DECISION_SCHEMA)?;
    Ok(value["engage"].as_bool().unwrap_or(false))
}

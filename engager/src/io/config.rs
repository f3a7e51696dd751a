//! Run configuration stored in `engager.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Engager configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngagerConfig {
    /// Maximum candidates to examine before the run ends.
    pub max_items: u32,

    /// Ceiling on engagements as a fraction of items processed, in (0, 1].
    pub rate_ceiling: f64,

    /// Items whose assembled text is shorter than this are skipped without
    /// counting as processed.
    pub min_text_chars: usize,

    /// Text fragments shorter than this are treated as UI chrome.
    pub min_fragment_chars: usize,

    /// Items qualify as candidates when their top edge is within this many
    /// pixels of the viewport top.
    pub near_band_px: f64,

    /// Items shorter than this are treated as collapsed placeholders.
    pub min_item_height_px: f64,

    /// Scroll distance applied when advancing the feed.
    pub scroll_step_px: i64,

    /// Consecutive empty locate results before the run stops as stalled.
    pub max_empty_locates: u32,

    /// Settle delay after UI actions; the page is eventually consistent.
    pub settle_ms: u64,

    /// Item-text prefix length for the classification prompt.
    pub decision_prefix_chars: usize,

    /// Item-text prefix length for the comment prompt.
    pub comment_prefix_chars: usize,

    /// Generic acknowledgment used when both generation tiers fail.
    pub fallback_comment: String,

    /// Optional topic keyword handed to the driver for feed selection.
    pub keyword: Option<String>,

    pub model: ModelConfig,
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    /// Command to invoke per model call (prompt on stdin, response on stdout).
    pub command: Vec<String>,
    /// Maximum time to wait for one model response.
    pub timeout_secs: u64,
    /// Truncate model output beyond this many bytes.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DriverConfig {
    /// Command for the long-lived browser driver (line-delimited JSON).
    pub command: Vec<String>,
}

impl Default for EngagerConfig {
    fn default() -> Self {
        Self {
            max_items: 10,
            rate_ceiling: 0.25,
            min_text_chars: 30,
            min_fragment_chars: 20,
            near_band_px: 400.0,
            min_item_height_px: 60.0,
            scroll_step_px: 600,
            max_empty_locates: 10,
            settle_ms: 1500,
            decision_prefix_chars: 1000,
            comment_prefix_chars: 500,
            fallback_comment: "Thanks for sharing, this is a really interesting perspective."
                .to_string(),
            keyword: None,
            model: ModelConfig::default(),
            driver: DriverConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            command: vec!["gemini".to_string()],
            timeout_secs: 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            command: vec!["engager-driver".to_string()],
        }
    }
}

impl EngagerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_items == 0 {
            return Err(anyhow!("max_items must be > 0"));
        }
        if !(self.rate_ceiling > 0.0 && self.rate_ceiling <= 1.0) {
            return Err(anyhow!("rate_ceiling must be in (0, 1]"));
        }
        if self.min_text_chars == 0 {
            return Err(anyhow!("min_text_chars must be > 0"));
        }
        if self.max_empty_locates == 0 {
            return Err(anyhow!("max_empty_locates must be > 0"));
        }
        if self.scroll_step_px <= 0 {
            return Err(anyhow!("scroll_step_px must be > 0"));
        }
        if self.fallback_comment.trim().is_empty() {
            return Err(anyhow!("fallback_comment must be non-empty"));
        }
        if self.model.timeout_secs == 0 {
            return Err(anyhow!("model.timeout_secs must be > 0"));
        }
        if self.model.output_limit_bytes == 0 {
            return Err(anyhow!("model.output_limit_bytes must be > 0"));
        }
        if self.model.command.is_empty() || self.model.command[0].trim().is_empty() {
            return Err(anyhow!("model.command must be a non-empty array"));
        }
        if self.driver.command.is_empty() || self.driver.command[0].trim().is_empty() {
            return Err(anyhow!("driver.command must be a non-empty array"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngagerConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngagerConfig> {
    if !path.exists() {
        let cfg = EngagerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngagerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngagerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

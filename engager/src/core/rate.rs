//! Engagement-rate budget enforcement.

use anyhow::{Result, anyhow};

use crate::core::types::RunCounters;

/// Configured upper bound on `engagements_performed / items_processed`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateCeiling(f64);

impl RateCeiling {
    /// A ceiling must be a fraction in `(0, 1]`.
    pub fn new(value: f64) -> Result<Self> {
        if !(value > 0.0 && value <= 1.0) {
            return Err(anyhow!("rate ceiling must be in (0, 1], got {value}"));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

/// Whether a new engagement may execute given the counters observed at
/// decision time.
///
/// The ratio is computed before the current item's own outcome is counted,
/// so the ceiling lags by at most one item. With nothing processed yet the
/// ratio reads `0.0`, which is below any valid ceiling.
pub fn engagement_allowed(counters: RunCounters, ceiling: RateCeiling) -> bool {
    counters.observed_ratio() < ceiling.get()
}

//! Pure, deterministic logic for the engagement loop.

pub mod blacklist;
pub mod heuristic;
pub mod invariants;
pub mod locator;
pub mod rate;
pub mod text;
pub mod types;

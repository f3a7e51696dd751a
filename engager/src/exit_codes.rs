//! Stable exit codes for engager CLI commands.

/// Command succeeded; a run ended at its item bound.
pub const OK: i32 = 0;
/// Command failed due to invalid config/arguments or other errors.
pub const INVALID: i32 = 1;
/// A run was halted by a controller invariant violation (logic fault).
pub const DESYNCED: i32 = 2;
/// A run stopped because the feed stopped yielding candidates.
pub const FEED_STALLED: i32 = 3;

//! Run-halting consistency faults.
//!
//! Expected external failures (detached nodes, model errors, feed reflow) are
//! recovered locally by the step pipeline. An [`InvariantViolation`] is
//! different: it means the controller's model of the page has desynchronized
//! from reality, which is a logic fault. It is raised immediately, bubbles
//! out of the session, and is recovered only at the CLI boundary via
//! `downcast_ref` for exit-code mapping.

use std::error::Error;
use std::fmt;

/// Which controller invariant was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantKind {
    /// An identifier was inserted into the blacklist twice.
    DuplicateObservation,
    /// A comment surface was already open when the engage path began.
    ComposerAlreadyOpen,
}

/// A controller logic fault; halts the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    pub kind: InvariantKind,
    pub detail: String,
}

impl InvariantViolation {
    pub fn new(kind: InvariantKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            InvariantKind::DuplicateObservation => "duplicate identifier observation",
            InvariantKind::ComposerAlreadyOpen => "comment surface already open",
        };
        write!(f, "invariant violated: {name} ({})", self.detail)
    }
}

impl Error for InvariantViolation {}

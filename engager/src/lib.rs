//! Autonomous feed engagement controller.
//!
//! This crate implements a scan-decide-generate-execute loop over a scrollable
//! content feed: locate the next readable item, decide whether to engage,
//! generate a short comment, and submit it through a browser-automation
//! capability, all under a global engagement-rate budget. The architecture
//! enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (candidate selection, text
//!   assembly, heuristic fallback, rate accounting, invariants). No I/O,
//!   fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (browser driver, language-model
//!   process, configuration). Isolated behind traits to enable scripted fakes
//!   in tests.
//!
//! Orchestration modules ([`locate`], [`extract`], [`decide`], [`compose`],
//! [`execute`], [`step`], [`session`]) coordinate core logic with I/O to
//! implement the engagement loop.

pub mod compose;
pub mod core;
pub mod decide;
pub mod execute;
pub mod exit_codes;
pub mod extract;
pub mod io;
pub mod locate;
pub mod logging;
pub mod session;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

//! Side-effecting collaborators behind narrow interfaces.

pub mod browser;
pub mod config;
pub mod driver;
pub mod model;
pub mod process;
pub mod prompt;

//! rulesmith daemon library.
//!
//! Exposes the daemon internals for integration testing.
//! In production, `rulesmith-daemon` runs as a binary (main.rs).

pub mod cli;
pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;

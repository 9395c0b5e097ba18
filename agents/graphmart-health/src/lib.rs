//! Graphmart Health Agent
//!
//! Readiness polling, health classification, multi-artifact aggregation and
//! continuous monitoring for graphmarts served by an Anzo server.
//!
//! # Design Principles
//! - Sequential: artifacts are checked one at a time, in input order
//! - Isolated: a failure on one artifact never aborts a batch
//! - Observable: every check is logged and counted

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod output;
pub mod telemetry;

// Re-export contracts
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use contracts::*;

/// Agent identifier reported by the HTTP surface
pub const AGENT_ID: &str = "graphmart-health-agent";

/// Agent version
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

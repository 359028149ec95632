//! LiveStyle Library
//!
//! Runs the LiveStyle sync engine behind an NDJSON stdio bridge.

pub mod bridge;

// Re-export main entry points
pub use bridge::run_bridge;

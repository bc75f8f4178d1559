//! Core engine: per-token aggregation, detection, and the session loop.

pub mod aggregator;
pub mod detector;
pub mod scheduler;
pub mod state;

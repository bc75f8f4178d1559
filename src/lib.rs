//! ARBWATCH: cross-source token price arbitrage scanner.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod candidates;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod providers;
pub mod storage;
pub mod types;

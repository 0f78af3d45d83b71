//! # expq-rs
//!
//! Postgres-backed experiment store with an atomic hypothesis work queue.
//!
//! Assembles deeply nested experiment documents in a single round trip
//! (datasets, hypotheses, runs, cross-referenced responses) and hands out
//! pending work to exactly one concurrent claimer, relying solely on
//! database-level atomicity.

pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod model;
pub mod store;
pub mod telemetry;

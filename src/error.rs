//! Error types for expq-rs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("experiment not found: {0}")]
    NotFound(String),

    /// The claim found no pending hypotheses. Distinct from `NotFound` so
    /// claim-then-fetch callers can branch before attempting the fetch.
    #[error("no pending experiment in queue")]
    EmptyQueue,

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: crate::model::HypothesisStatus,
        to: crate::model::HypothesisStatus,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("filter error: {0}")]
    Filter(String),

    #[error("input enrichment failed: {0}")]
    Enrichment(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Typed error hierarchy for the tracker.
//!
//! Store functions return `anyhow::Result`; domain failures are raised as
//! `TrackerError` inside the `anyhow` chain and recovered at the API boundary
//! with `downcast_ref`.

use thiserror::Error;

/// Errors raised by the tracker store and request validation.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl TrackerError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts, planning failures). Infrastructure concerns belong
/// elsewhere.
///
/// Business-outcome states (a short pick, a damaged item, a count variance) are
/// **not** errors: they are recorded as entity statuses and reported through
/// completion events. Callers branch on status, not on `Err`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, illegal transition).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// No candidate location satisfies the placement constraints.
    ///
    /// Surfaced as a planning failure; the caller decides whether to relax the
    /// strategy or escalate.
    #[error("no suitable location: {0}")]
    NoSuitableLocation(String),

    /// Packed quantities do not reconcile with the required quantities.
    #[error("quantity mismatch: {0}")]
    QuantityMismatch(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn no_suitable_location(msg: impl Into<String>) -> Self {
        Self::NoSuitableLocation(msg.into())
    }

    pub fn quantity_mismatch(msg: impl Into<String>) -> Self {
        Self::QuantityMismatch(msg.into())
    }
}

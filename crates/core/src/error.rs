//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
///
/// Each variant represents a decision the operator has to make: pick a
/// smaller delta, use a correction, retry. None of them is recovered from
/// silently.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty SKU, negative threshold).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced product does not exist.
    #[error("product not found")]
    ProductNotFound,

    /// A stock adjustment with a zero delta.
    #[error("delta must be a non-zero integer")]
    InvalidDelta,

    /// A non-correction movement would take stock below zero.
    #[error("insufficient stock: {on_hand} on hand, change of {requested} would go negative")]
    InsufficientStock { on_hand: i64, requested: i64 },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A conflict occurred (e.g. duplicate creation).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_stock(on_hand: i64, requested: i64) -> Self {
        Self::InsufficientStock { on_hand, requested }
    }
}

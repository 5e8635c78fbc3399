//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// stock shortfalls, illegal state transitions). Storage concerns belong to
/// the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. zero quantity on a line item).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Applying a quantity change would drive stock below zero.
    #[error("insufficient quantity for {asset}: requested {requested}, available {available}")]
    InsufficientQuantity {
        asset: String,
        requested: i64,
        available: i64,
    },

    /// A status change that the lifecycle does not allow.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// A requested record was not found (domain-level).
    #[error("not found: {0}")]
    NotFound(String),
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

    pub fn insufficient(asset: impl Into<String>, requested: i64, available: i64) -> Self {
        Self::InsufficientQuantity {
            asset: asset.into(),
            requested,
            available,
        }
    }

    pub fn invalid_transition(from: impl core::fmt::Display, to: impl core::fmt::Display) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_quantity_message_names_asset_and_amounts() {
        let err = DomainError::insufficient("Scaffold clamp", 12, 4);
        assert_eq!(
            err.to_string(),
            "insufficient quantity for Scaffold clamp: requested 12, available 4"
        );
    }

    #[test]
    fn invalid_transition_renders_both_states() {
        let err = DomainError::invalid_transition("outstanding", "return_completed");
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        assert_eq!(
            err.to_string(),
            "invalid transition from outstanding to return_completed"
        );
    }
}

//! Advance ledger error types.
//!
//! Every failure is surfaced as a distinguishable variant. The ledger never
//! corrects a request on the caller's behalf.

use lexledger_shared::types::{AdvanceId, CurrencyCode, MoneyError};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur during advance ledger operations.
#[derive(Debug, Error)]
pub enum AdvanceError {
    // ========== Validation Errors ==========
    /// Request is malformed or violates a scoping rule.
    #[error("Validation failed: {0}")]
    Validation(String),

    // ========== Lookup Errors ==========
    /// Entry does not exist or has been soft-deleted.
    #[error("Advance not found: {0}")]
    NotFound(AdvanceId),

    /// No active entry matched a selector.
    #[error("No active advance matches {0}")]
    NoMatchingAdvance(String),

    // ========== Balance Errors ==========
    /// Deduction exceeds the remaining balance.
    #[error(
        "Insufficient funds in advance {advance_id}: requested {requested}, available {available}"
    )]
    InsufficientFunds {
        /// The entry that was checked.
        advance_id: AdvanceId,
        /// Amount the caller asked for.
        requested: Decimal,
        /// Remaining balance at the time of the check.
        available: Decimal,
    },

    /// A derived total no longer fits the decimal range.
    #[error("Total for {0} is out of range")]
    AmountOverflow(CurrencyCode),

    // ========== State Errors ==========
    /// Operation not allowed in the entry's current state or for its kind.
    #[error("Invalid state transition for advance {advance_id}: {reason}")]
    InvalidStateTransition {
        /// The entry.
        advance_id: AdvanceId,
        /// Why the transition was refused.
        reason: String,
    },

    /// Paired expense and deduction could not both complete; both were rolled back.
    #[error("Expense and deduction could not be applied together: {0}")]
    AtomicityFailure(String),

    // ========== Concurrency Errors ==========
    /// The entry changed between the balance check and the write.
    #[error("Concurrent modification of advance {0}, please retry")]
    ConcurrentModification(AdvanceId),

    // ========== Storage Errors ==========
    /// Backend storage failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AdvanceError {
    /// Shorthand for an `InvalidStateTransition`.
    pub fn invalid_state(advance_id: AdvanceId, reason: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            advance_id,
            reason: reason.into(),
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) | Self::NoMatchingAdvance(_) => "not_found",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::AmountOverflow(_) => "amount_out_of_range",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::AtomicityFailure(_) => "atomicity_failure",
            Self::ConcurrentModification(_) => "concurrent_modification",
            Self::Storage(_) => "internal_error",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::Validation(_) => 400,

            // 404 Not Found
            Self::NotFound(_) | Self::NoMatchingAdvance(_) => 404,

            // 409 Conflict - state and concurrency errors
            Self::InvalidStateTransition { .. } | Self::ConcurrentModification(_) => 409,

            // 422 Unprocessable - business rule
            Self::InsufficientFunds { .. } | Self::AmountOverflow(_) => 422,

            // 500 Internal Server Error
            Self::AtomicityFailure(_) | Self::Storage(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

impl From<MoneyError> for AdvanceError {
    fn from(err: MoneyError) -> Self {
        Self::Validation(err.to_string())
    }
}

//! Deduction and refund rules.
//!
//! Both storage backends run the same checks here before writing, so the
//! state machine lives in one place:
//!
//! ```text
//! active --deduct (balance > 0 left)--> active
//! active --deduct (balance hits 0)----> depleted
//! active | depleted --refund----------> refunded (terminal)
//! ```

use chrono::{DateTime, Utc};
use lexledger_shared::types::{AllocationId, CurrencyCode};
use rust_decimal::Decimal;

use super::error::AdvanceError;
use super::types::{Advance, AdvanceStatus, Allocation};

/// Pure rules for drawing down and refunding entries.
pub struct AllocationEngine;

impl AllocationEngine {
    /// Checks that `amount` can be drawn from `advance` right now.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the entry is soft-deleted
    /// - `InvalidStateTransition` for fee payments and refunded entries
    /// - `InsufficientFunds` if the balance is too small
    pub fn check_deduction(advance: &Advance, amount: Decimal) -> Result<(), AdvanceError> {
        if !advance.is_live() {
            return Err(AdvanceError::NotFound(advance.id));
        }
        if advance.kind.is_fee_payment() {
            return Err(AdvanceError::invalid_state(
                advance.id,
                format!("{} entries carry no balance to deduct from", advance.kind),
            ));
        }
        if advance.status == AdvanceStatus::Refunded {
            return Err(AdvanceError::invalid_state(
                advance.id,
                "refunded entries cannot be deducted from",
            ));
        }
        if amount > advance.balance_remaining {
            return Err(AdvanceError::InsufficientFunds {
                advance_id: advance.id,
                requested: amount,
                available: advance.balance_remaining,
            });
        }
        Ok(())
    }

    /// Checks the deduction and applies it in place, returning the audit row.
    ///
    /// The entry flips to `depleted` when its balance reaches exactly zero.
    ///
    /// # Errors
    ///
    /// See [`Self::check_deduction`].
    pub fn apply_deduction(
        advance: &mut Advance,
        amount: Decimal,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Allocation, AdvanceError> {
        Self::check_deduction(advance, amount)?;

        advance.balance_remaining -= amount;
        if advance.balance_remaining.is_zero() {
            advance.status = AdvanceStatus::Depleted;
        }
        advance.updated_at = now;

        Ok(Allocation {
            id: AllocationId::new(),
            advance_id: advance.id,
            amount,
            note,
            created_at: now,
        })
    }

    /// Checks that the entry may be refunded.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the entry is soft-deleted
    /// - `InvalidStateTransition` for fee payments and entries already refunded
    pub fn check_refund(advance: &Advance) -> Result<(), AdvanceError> {
        if !advance.is_live() {
            return Err(AdvanceError::NotFound(advance.id));
        }
        if advance.kind.is_fee_payment() {
            return Err(AdvanceError::invalid_state(
                advance.id,
                format!("{} entries cannot be refunded", advance.kind),
            ));
        }
        if advance.status == AdvanceStatus::Refunded {
            return Err(AdvanceError::invalid_state(advance.id, "already refunded"));
        }
        Ok(())
    }

    /// Marks the entry refunded. The remaining balance is returned to the payer
    /// and no longer counts toward any balance.
    ///
    /// # Errors
    ///
    /// See [`Self::check_refund`].
    pub fn apply_refund(advance: &mut Advance, now: DateTime<Utc>) -> Result<(), AdvanceError> {
        Self::check_refund(advance)?;
        advance.status = AdvanceStatus::Refunded;
        advance.updated_at = now;
        Ok(())
    }

    /// Ensures an expense is charged in the entry's own currency.
    ///
    /// # Errors
    ///
    /// Returns `Validation` on mismatch; amounts are never converted.
    pub fn check_currency(advance: &Advance, currency: &CurrencyCode) -> Result<(), AdvanceError> {
        if &advance.currency != currency {
            return Err(AdvanceError::Validation(format!(
                "expense currency {currency} does not match advance currency {}",
                advance.currency
            )));
        }
        Ok(())
    }
}

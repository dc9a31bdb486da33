//! Lawyer reimbursement figures.
//!
//! Ledger deductions and lawyer-paid expense records can disagree, e.g. when a
//! lawyer paid an expense before any matching deduction was recorded. The
//! calculator takes the larger of the two spend estimates so the net figure
//! never overstates what the lawyer still holds.

use lexledger_shared::types::{CurrencyCode, LawyerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::AdvanceError;
use super::expense::Expense;
use super::types::{Advance, AdvanceKind};

/// Direction of the outstanding balance between firm and lawyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// Lawyer spent more than advanced (`net_balance < 0`).
    FirmOwesLawyer,
    /// Lawyer still holds firm cash (`net_balance > 0`).
    LawyerHoldsFunds,
    /// Nothing outstanding.
    Settled,
}

impl Settlement {
    /// Classifies a net balance.
    #[must_use]
    pub fn from_net(net_balance: Decimal) -> Self {
        match net_balance.cmp(&Decimal::ZERO) {
            std::cmp::Ordering::Less => Self::FirmOwesLawyer,
            std::cmp::Ordering::Equal => Self::Settled,
            std::cmp::Ordering::Greater => Self::LawyerHoldsFunds,
        }
    }
}

/// Derived, display-only reimbursement figures for one lawyer and currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LawyerBalance {
    /// Lawyer ID.
    pub lawyer_id: LawyerId,
    /// Currency of every figure below.
    pub currency: CurrencyCode,
    /// Sum of `amount` over the lawyer's advances.
    pub total_advanced: Decimal,
    /// Sum of `balance_remaining` over the same advances.
    pub balance_from_advances: Decimal,
    /// Sum of expenses the lawyer paid out of pocket.
    pub expenses_paid: Decimal,
    /// `max(total_advanced - balance_from_advances, expenses_paid)`.
    pub total_spent: Decimal,
    /// `total_advanced - total_spent`.
    pub net_balance: Decimal,
    /// Sign of `net_balance`.
    pub settlement: Settlement,
}

/// Computes reimbursement figures from the lawyer's entries and expenses.
///
/// Only live `lawyer_advance` entries and paid-by-lawyer expenses for
/// `lawyer_id` in `currency` are counted; everything else is ignored, so
/// callers may pass unfiltered slices.
///
/// # Errors
///
/// Returns `AdvanceError::AmountOverflow` if a sum leaves the decimal range.
pub fn compute_lawyer_balance(
    lawyer_id: LawyerId,
    currency: &CurrencyCode,
    advances: &[Advance],
    expenses: &[Expense],
) -> Result<LawyerBalance, AdvanceError> {
    let overflow = || AdvanceError::AmountOverflow(currency.clone());

    let (total_advanced, balance_from_advances) = advances
        .iter()
        .filter(|a| {
            a.is_live()
                && a.kind == AdvanceKind::LawyerAdvance
                && a.lawyer_id == Some(lawyer_id)
                && &a.currency == currency
        })
        .try_fold((Decimal::ZERO, Decimal::ZERO), |(amount, balance), a| {
            Some((
                amount.checked_add(a.amount)?,
                balance.checked_add(a.balance_remaining)?,
            ))
        })
        .ok_or_else(overflow)?;

    let expenses_paid = expenses
        .iter()
        .filter(|e| e.paid_by_lawyer && e.lawyer_id == Some(lawyer_id) && &e.currency == currency)
        .try_fold(Decimal::ZERO, |sum, e| sum.checked_add(e.amount))
        .ok_or_else(overflow)?;

    // balance_remaining never exceeds amount, so the difference stays in range.
    let total_spent = (total_advanced - balance_from_advances).max(expenses_paid);
    let net_balance = total_advanced.checked_sub(total_spent).ok_or_else(overflow)?;

    Ok(LawyerBalance {
        lawyer_id,
        currency: currency.clone(),
        total_advanced,
        balance_from_advances,
        expenses_paid,
        total_spent,
        net_balance,
        settlement: Settlement::from_net(net_balance),
    })
}

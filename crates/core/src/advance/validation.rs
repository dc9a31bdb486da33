//! Input validation for entries, patches and expenses.
//!
//! Scoping rules per kind:
//! - client-scoped kinds (retainer, expense advance, fee payments) need a
//!   `client_id` and must not name a lawyer
//! - `lawyer_advance` needs a `lawyer_id`; `client_id` is optional
//! - a `matter_id` is only meaningful together with a `client_id`

use chrono::{DateTime, Utc};
use lexledger_shared::types::{
    AdvanceId, ClientId, CurrencyCode, ExpenseId, MatterId, validate_amount,
};
use rust_decimal::Decimal;

use super::error::AdvanceError;
use super::expense::{Expense, ExpenseFunding, NewExpense};
use super::types::{
    Advance, AdvanceKind, AdvancePatch, AdvanceSelector, AdvanceStatus, DeductionRequest,
    DeductionTarget, MetadataUpdate, NewAdvance,
};

/// Validates a creation request and builds the entry to persist.
///
/// Balance-tracked kinds start with `balance_remaining = amount`; fee
/// payments are recorded fully consumed (`balance_remaining = 0`).
///
/// # Errors
///
/// Returns `AdvanceError::Validation` when a scoping rule, the amount or the
/// currency is invalid.
pub fn validate_new_advance(
    input: &NewAdvance,
    id: AdvanceId,
    now: DateTime<Utc>,
) -> Result<Advance, AdvanceError> {
    let amount = validate_amount(input.amount)?;
    let currency: CurrencyCode = input.currency.parse()?;

    check_matter_scope(input.client_id, input.matter_id)?;

    if input.kind.is_client_scoped() {
        if input.client_id.is_none() {
            return Err(AdvanceError::Validation(format!(
                "{} requires client_id",
                input.kind
            )));
        }
        if input.lawyer_id.is_some() {
            return Err(AdvanceError::Validation(format!(
                "{} must not carry lawyer_id",
                input.kind
            )));
        }
    } else if input.lawyer_id.is_none() {
        return Err(AdvanceError::Validation(format!(
            "{} requires lawyer_id",
            input.kind
        )));
    }

    let balance_remaining = if input.kind.is_balance_tracked() {
        amount
    } else {
        Decimal::ZERO
    };

    Ok(Advance {
        id,
        kind: input.kind,
        client_id: input.client_id,
        matter_id: input.matter_id,
        lawyer_id: input.lawyer_id,
        amount,
        currency,
        balance_remaining,
        status: AdvanceStatus::Active,
        date_received: input.date_received.unwrap_or_else(|| now.date_naive()),
        description: clean_text(input.description.as_deref()),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
}

/// Checks a patch against the stored entry and keeps only descriptive changes.
///
/// # Errors
///
/// Returns `AdvanceError::Validation` if the patch would change an immutable field.
pub fn validate_patch(
    current: &Advance,
    patch: &AdvancePatch,
) -> Result<MetadataUpdate, AdvanceError> {
    if patch.kind.is_some_and(|kind| kind != current.kind) {
        return Err(immutable("kind"));
    }
    if patch.client_id.is_some() && patch.client_id != current.client_id {
        return Err(immutable("client_id"));
    }
    if patch.matter_id.is_some() && patch.matter_id != current.matter_id {
        return Err(immutable("matter_id"));
    }
    if patch.lawyer_id.is_some() && patch.lawyer_id != current.lawyer_id {
        return Err(immutable("lawyer_id"));
    }
    if patch.amount.is_some_and(|amount| amount != current.amount) {
        return Err(immutable("amount"));
    }
    if let Some(currency) = &patch.currency {
        let currency: CurrencyCode = currency.parse()?;
        if currency != current.currency {
            return Err(immutable("currency"));
        }
    }

    Ok(MetadataUpdate {
        description: patch.description.as_deref().map(|text| clean_text(Some(text))),
        date_received: patch.date_received,
    })
}

/// Validates an expense and works out which deduction, if any, must accompany it.
///
/// # Errors
///
/// Returns `AdvanceError::Validation` for malformed input or a funding source
/// the expense cannot be matched to.
pub fn validate_new_expense(
    input: &NewExpense,
    id: ExpenseId,
    now: DateTime<Utc>,
) -> Result<(Expense, Option<DeductionRequest>), AdvanceError> {
    let amount = validate_amount(input.amount)?;
    let currency: CurrencyCode = input.currency.parse()?;

    check_matter_scope(input.client_id, input.matter_id)?;

    let Some(description) = clean_text(Some(&input.description)) else {
        return Err(AdvanceError::Validation(
            "expense description is required".to_string(),
        ));
    };
    if input.paid_by_lawyer && input.lawyer_id.is_none() {
        return Err(AdvanceError::Validation(
            "paid_by_lawyer requires lawyer_id".to_string(),
        ));
    }

    let target = match &input.funding {
        ExpenseFunding::Advance { advance_id } => Some(DeductionTarget::Entry(*advance_id)),
        ExpenseFunding::ClientExpenseAdvance => {
            let Some(client_id) = input.client_id else {
                return Err(AdvanceError::Validation(
                    "client_expense_advance funding requires client_id".to_string(),
                ));
            };
            Some(DeductionTarget::Oldest(AdvanceSelector {
                kind: AdvanceKind::ClientExpenseAdvance,
                client_id: Some(client_id),
                matter_id: input.matter_id,
                lawyer_id: None,
            }))
        }
        ExpenseFunding::LawyerAdvance => {
            let Some(lawyer_id) = input.lawyer_id else {
                return Err(AdvanceError::Validation(
                    "lawyer_advance funding requires lawyer_id".to_string(),
                ));
            };
            Some(DeductionTarget::Oldest(AdvanceSelector {
                kind: AdvanceKind::LawyerAdvance,
                client_id: None,
                matter_id: None,
                lawyer_id: Some(lawyer_id),
            }))
        }
        ExpenseFunding::None => None,
    };

    let deduction = target.map(|target| DeductionRequest {
        target,
        amount,
        note: Some(format!("expense {id}: {description}")),
    });

    let expense = Expense {
        id,
        client_id: input.client_id,
        matter_id: input.matter_id,
        lawyer_id: input.lawyer_id,
        amount,
        currency,
        description,
        expense_date: input.expense_date.unwrap_or_else(|| now.date_naive()),
        paid_by_lawyer: input.paid_by_lawyer,
        advance_id: None,
        created_at: now,
    };

    Ok((expense, deduction))
}

/// Only the two client fund kinds can be drawn down by selector.
///
/// # Errors
///
/// Returns `AdvanceError::Validation` for any other kind.
pub fn check_retainer_kind(kind: AdvanceKind) -> Result<(), AdvanceError> {
    match kind {
        AdvanceKind::ClientRetainer | AdvanceKind::ClientExpenseAdvance => Ok(()),
        other => Err(AdvanceError::Validation(format!(
            "cannot deduct a retainer of kind {other}"
        ))),
    }
}

fn check_matter_scope(
    client_id: Option<ClientId>,
    matter_id: Option<MatterId>,
) -> Result<(), AdvanceError> {
    if matter_id.is_some() && client_id.is_none() {
        return Err(AdvanceError::Validation(
            "matter_id requires client_id".to_string(),
        ));
    }
    Ok(())
}

fn clean_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn immutable(field: &str) -> AdvanceError {
    AdvanceError::Validation(format!("{field} is immutable once the advance is created"))
}

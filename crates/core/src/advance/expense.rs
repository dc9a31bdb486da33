//! Expense records consumed by the expense-advance bridge.
//!
//! Expenses belong to a neighbouring subsystem; the ledger only needs enough
//! of their shape to charge them against an advance atomically and to total
//! what a lawyer paid out of pocket.

use chrono::{DateTime, NaiveDate, Utc};
use lexledger_shared::types::{AdvanceId, ClientId, CurrencyCode, ExpenseId, LawyerId, MatterId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where the money for an expense comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ExpenseFunding {
    /// Charge an explicit entry.
    Advance {
        /// Entry to deduct from.
        advance_id: AdvanceId,
    },
    /// Charge the oldest active expense advance of the expense's client and matter.
    ClientExpenseAdvance,
    /// Charge the oldest active lawyer advance of the expense's lawyer.
    LawyerAdvance,
    /// Record the expense without touching the ledger.
    None,
}

/// A persisted expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    /// Expense ID.
    pub id: ExpenseId,
    /// Client the expense was incurred for.
    pub client_id: Option<ClientId>,
    /// Matter the expense was incurred for.
    pub matter_id: Option<MatterId>,
    /// Lawyer who incurred or paid the expense.
    pub lawyer_id: Option<LawyerId>,
    /// Amount spent.
    pub amount: Decimal,
    /// Currency code.
    pub currency: CurrencyCode,
    /// Free-text description.
    pub description: String,
    /// Date of the expense.
    pub expense_date: NaiveDate,
    /// Whether the lawyer paid it out of pocket.
    pub paid_by_lawyer: bool,
    /// Entry the expense was charged to, if any.
    pub advance_id: Option<AdvanceId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for recording an expense with an optional deduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    /// Client ID.
    pub client_id: Option<ClientId>,
    /// Matter ID.
    pub matter_id: Option<MatterId>,
    /// Lawyer ID.
    pub lawyer_id: Option<LawyerId>,
    /// Amount spent (must be positive).
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// Free-text description.
    pub description: String,
    /// Date of the expense; defaults to today.
    pub expense_date: Option<NaiveDate>,
    /// Whether the lawyer paid it out of pocket.
    #[serde(default)]
    pub paid_by_lawyer: bool,
    /// Funding source.
    pub funding: ExpenseFunding,
}

/// Filter options for listing expenses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpenseFilter {
    /// Filter by client.
    pub client_id: Option<ClientId>,
    /// Filter by matter.
    pub matter_id: Option<MatterId>,
    /// Filter by lawyer.
    pub lawyer_id: Option<LawyerId>,
    /// Filter by the paid-by-lawyer flag.
    pub paid_by_lawyer: Option<bool>,
    /// Filter by currency.
    pub currency: Option<CurrencyCode>,
}

impl ExpenseFilter {
    /// Returns true if the expense satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, expense: &Expense) -> bool {
        self.client_id.is_none_or(|id| expense.client_id == Some(id))
            && self.matter_id.is_none_or(|id| expense.matter_id == Some(id))
            && self.lawyer_id.is_none_or(|id| expense.lawyer_id == Some(id))
            && self
                .paid_by_lawyer
                .is_none_or(|flag| expense.paid_by_lawyer == flag)
            && self
                .currency
                .as_ref()
                .is_none_or(|currency| &expense.currency == currency)
    }
}

/// Result of the expense-advance bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpenseRecorded {
    /// The persisted expense.
    pub expense: Expense,
    /// The deduction, when the expense was funded from an advance.
    pub deduction: Option<super::types::DeductionOutcome>,
}

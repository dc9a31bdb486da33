//! Advance ledger service.
//!
//! The single entry point for both call surfaces: the REST routes and any
//! embedded caller go through `AdvanceService`, which validates input, applies
//! the ledger rules and delegates persistence to an [`AdvanceStore`].

use std::sync::Arc;

use chrono::Utc;
use lexledger_shared::types::{
    AdvanceId, ClientId, CurrencyCode, ExpenseId, LawyerId, MatterId, validate_amount,
};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::balance::BalanceAggregator;
use super::error::AdvanceError;
use super::expense::{Expense, ExpenseFilter, ExpenseRecorded, NewExpense};
use super::reimbursement::{self, LawyerBalance};
use super::store::{AdvanceStore, require_live};
use super::types::{
    Advance, AdvanceFilter, AdvanceKind, AdvancePatch, AdvanceSelector, Allocation,
    BalanceSummary, ClientFundsSummary, DeductionOutcome, DeductionRequest, DeductionTarget,
    NewAdvance,
};
use super::validation;

/// How many times a deduction is attempted when the row changed underneath it.
pub const MAX_DEDUCTION_ATTEMPTS: u32 = 3;

/// Ledger operations over a pluggable store.
#[derive(Clone)]
pub struct AdvanceService {
    store: Arc<dyn AdvanceStore>,
    default_currency: CurrencyCode,
}

impl std::fmt::Debug for AdvanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvanceService")
            .field("backend", &self.store.backend_name())
            .field("default_currency", &self.default_currency)
            .finish()
    }
}

impl AdvanceService {
    /// Creates a service over the given store. Lawyer balances default to USD.
    #[must_use]
    pub fn new(store: Arc<dyn AdvanceStore>) -> Self {
        Self {
            store,
            default_currency: CurrencyCode::usd(),
        }
    }

    /// Sets the currency used when a lawyer-balance query names none.
    #[must_use]
    pub fn with_default_currency(mut self, currency: CurrencyCode) -> Self {
        self.default_currency = currency;
        self
    }

    /// Name of the active backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    // ========== Entry Store ==========

    /// Receives funds or records a fee payment.
    pub async fn add_advance(&self, input: &NewAdvance) -> Result<Advance, AdvanceError> {
        let advance = validation::validate_new_advance(input, AdvanceId::new(), Utc::now())?;
        let advance = self.store.insert_advance(advance).await?;
        info!(
            advance_id = %advance.id,
            kind = %advance.kind,
            amount = %advance.amount,
            currency = %advance.currency,
            "Advance recorded"
        );
        Ok(advance)
    }

    /// Returns a live entry.
    pub async fn get_advance(&self, id: AdvanceId) -> Result<Advance, AdvanceError> {
        require_live(id, self.store.find_advance(id).await?)
    }

    /// Lists entries, ordered oldest first.
    pub async fn list_advances(
        &self,
        filter: &AdvanceFilter,
    ) -> Result<Vec<Advance>, AdvanceError> {
        self.store.list_advances(filter).await
    }

    /// Changes descriptive fields of a live entry.
    pub async fn update_advance(
        &self,
        id: AdvanceId,
        patch: &AdvancePatch,
    ) -> Result<Advance, AdvanceError> {
        let current = self.get_advance(id).await?;
        let update = validation::validate_patch(&current, patch)?;
        if update.is_empty() {
            return Ok(current);
        }
        let advance = self.store.update_metadata(id, &update, Utc::now()).await?;
        debug!(advance_id = %id, "Advance metadata updated");
        Ok(advance)
    }

    /// Soft-deletes an entry. Historical deductions stand.
    pub async fn delete_advance(&self, id: AdvanceId) -> Result<(), AdvanceError> {
        let advance = self.store.soft_delete(id, Utc::now()).await?;
        info!(
            advance_id = %id,
            balance_remaining = %advance.balance_remaining,
            "Advance soft-deleted"
        );
        Ok(())
    }

    /// Hard-deletes a soft-deleted entry and its allocation rows.
    pub async fn purge_advance(&self, id: AdvanceId) -> Result<(), AdvanceError> {
        self.store.purge(id).await?;
        info!(advance_id = %id, "Advance purged");
        Ok(())
    }

    /// Marks an entry refunded; terminal.
    pub async fn refund_advance(&self, id: AdvanceId) -> Result<Advance, AdvanceError> {
        let advance = self.store.refund(id, Utc::now()).await?;
        info!(
            advance_id = %id,
            balance_remaining = %advance.balance_remaining,
            "Advance refunded"
        );
        Ok(advance)
    }

    /// Lists the allocation audit rows of an entry (soft-deleted entries included).
    pub async fn list_allocations(&self, id: AdvanceId) -> Result<Vec<Allocation>, AdvanceError> {
        if self.store.find_advance(id).await?.is_none() {
            return Err(AdvanceError::NotFound(id));
        }
        self.store.list_allocations(id).await
    }

    // ========== Deductions ==========

    /// Deducts from an explicit entry.
    pub async fn deduct_from_advance(
        &self,
        id: AdvanceId,
        amount: Decimal,
        note: Option<String>,
    ) -> Result<DeductionOutcome, AdvanceError> {
        let request = DeductionRequest {
            target: DeductionTarget::Entry(id),
            amount: validate_amount(amount)?,
            note,
        };
        self.deduct(&request).await
    }

    /// Deducts from the oldest active retainer or expense advance of a client.
    ///
    /// `matter_id = None` selects a client-wide entry. The whole amount must
    /// fit in that one entry; nothing is split across entries.
    pub async fn deduct_retainer(
        &self,
        client_id: ClientId,
        matter_id: Option<MatterId>,
        kind: AdvanceKind,
        amount: Decimal,
        note: Option<String>,
    ) -> Result<DeductionOutcome, AdvanceError> {
        validation::check_retainer_kind(kind)?;
        let request = DeductionRequest {
            target: DeductionTarget::Oldest(AdvanceSelector {
                kind,
                client_id: Some(client_id),
                matter_id,
                lawyer_id: None,
            }),
            amount: validate_amount(amount)?,
            note,
        };
        self.deduct(&request).await
    }

    async fn deduct(&self, request: &DeductionRequest) -> Result<DeductionOutcome, AdvanceError> {
        let mut attempt = 1;
        loop {
            match self.store.deduct(request, Utc::now()).await {
                Ok(outcome) => {
                    info!(
                        advance_id = %outcome.advance.id,
                        amount = %request.amount,
                        balance_remaining = %outcome.advance.balance_remaining,
                        status = %outcome.advance.status,
                        "Deduction applied"
                    );
                    return Ok(outcome);
                }
                Err(err) if err.is_retryable() && attempt < MAX_DEDUCTION_ATTEMPTS => {
                    debug!(attempt, error = %err, "Retrying deduction");
                    attempt += 1;
                }
                Err(err) => {
                    warn!(amount = %request.amount, error = %err, "Deduction rejected");
                    return Err(err);
                }
            }
        }
    }

    // ========== Balances ==========

    /// Remaining retainer funds of a client; all matters when `matter_id` is `None`.
    pub async fn get_client_retainer(
        &self,
        client_id: ClientId,
        matter_id: Option<MatterId>,
        currency: Option<&CurrencyCode>,
    ) -> Result<BalanceSummary, AdvanceError> {
        self.client_balance(AdvanceKind::ClientRetainer, client_id, matter_id, currency)
            .await
    }

    /// Remaining expense-advance funds of a client; all matters when `matter_id` is `None`.
    pub async fn get_client_expense_advance(
        &self,
        client_id: ClientId,
        matter_id: Option<MatterId>,
        currency: Option<&CurrencyCode>,
    ) -> Result<BalanceSummary, AdvanceError> {
        self.client_balance(AdvanceKind::ClientExpenseAdvance, client_id, matter_id, currency)
            .await
    }

    /// Remaining firm cash held by a lawyer.
    pub async fn get_lawyer_advance(
        &self,
        lawyer_id: LawyerId,
        currency: Option<&CurrencyCode>,
    ) -> Result<BalanceSummary, AdvanceError> {
        let filter = AdvanceFilter {
            lawyer_id: Some(lawyer_id),
            kind: Some(AdvanceKind::LawyerAdvance),
            ..Default::default()
        };
        let entries = self.store.list_advances(&filter).await?;
        BalanceAggregator::summarize(&entries, currency)
    }

    /// Retainer and expense-advance balances in one call.
    pub async fn client_summary(
        &self,
        client_id: ClientId,
        matter_id: Option<MatterId>,
    ) -> Result<ClientFundsSummary, AdvanceError> {
        let filter = AdvanceFilter {
            client_id: Some(client_id),
            matter_id,
            ..Default::default()
        };
        let entries = self.store.list_advances(&filter).await?;
        let of_kind = |kind: AdvanceKind| {
            BalanceAggregator::summarize(entries.iter().filter(|a| a.kind == kind), None)
        };

        Ok(ClientFundsSummary {
            client_id,
            matter_id,
            retainer: of_kind(AdvanceKind::ClientRetainer)?,
            expense_advance: of_kind(AdvanceKind::ClientExpenseAdvance)?,
        })
    }

    async fn client_balance(
        &self,
        kind: AdvanceKind,
        client_id: ClientId,
        matter_id: Option<MatterId>,
        currency: Option<&CurrencyCode>,
    ) -> Result<BalanceSummary, AdvanceError> {
        let filter = AdvanceFilter {
            client_id: Some(client_id),
            matter_id,
            kind: Some(kind),
            ..Default::default()
        };
        let entries = self.store.list_advances(&filter).await?;
        BalanceAggregator::summarize(&entries, currency)
    }

    /// Reimbursement figures for a lawyer in one currency.
    pub async fn compute_lawyer_balance(
        &self,
        lawyer_id: LawyerId,
        currency: Option<CurrencyCode>,
    ) -> Result<LawyerBalance, AdvanceError> {
        let currency = currency.unwrap_or_else(|| self.default_currency.clone());
        let advances = self
            .store
            .list_advances(&AdvanceFilter {
                lawyer_id: Some(lawyer_id),
                kind: Some(AdvanceKind::LawyerAdvance),
                currency: Some(currency.clone()),
                ..Default::default()
            })
            .await?;
        let expenses = self
            .store
            .list_expenses(&ExpenseFilter {
                lawyer_id: Some(lawyer_id),
                paid_by_lawyer: Some(true),
                currency: Some(currency.clone()),
                ..Default::default()
            })
            .await?;

        reimbursement::compute_lawyer_balance(lawyer_id, &currency, &advances, &expenses)
    }

    // ========== Expense Bridge ==========

    /// Records an expense and its deduction as one atomic unit.
    pub async fn add_expense_with_deduction(
        &self,
        input: &NewExpense,
    ) -> Result<ExpenseRecorded, AdvanceError> {
        let (expense, deduction) =
            validation::validate_new_expense(input, ExpenseId::new(), Utc::now())?;

        let mut attempt = 1;
        loop {
            match self
                .store
                .record_expense(expense.clone(), deduction.as_ref(), Utc::now())
                .await
            {
                Ok(recorded) => {
                    let balance_remaining = recorded
                        .deduction
                        .as_ref()
                        .map(|d| d.advance.balance_remaining);
                    info!(
                        expense_id = %recorded.expense.id,
                        amount = %recorded.expense.amount,
                        advance_id = ?recorded.expense.advance_id,
                        balance_remaining = ?balance_remaining,
                        "Expense recorded"
                    );
                    return Ok(recorded);
                }
                Err(err) if err.is_retryable() && attempt < MAX_DEDUCTION_ATTEMPTS => {
                    debug!(attempt, error = %err, "Retrying expense bridge");
                    attempt += 1;
                }
                Err(err) => {
                    warn!(expense_id = %expense.id, error = %err, "Expense rejected");
                    return Err(err);
                }
            }
        }
    }

    /// Lists recorded expenses.
    pub async fn list_expenses(
        &self,
        filter: &ExpenseFilter,
    ) -> Result<Vec<Expense>, AdvanceError> {
        self.store.list_expenses(filter).await
    }
}

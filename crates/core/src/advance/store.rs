//! Storage seam for the advance ledger.
//!
//! The service holds one `Arc<dyn AdvanceStore>` chosen at startup: the
//! in-memory store for embedded single-user mode or the Postgres repository
//! for networked mode. Business rules stay in the service and the
//! [`AllocationEngine`](super::allocation::AllocationEngine); a store only has
//! to make each call atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lexledger_shared::types::AdvanceId;

use super::error::AdvanceError;
use super::expense::{Expense, ExpenseFilter, ExpenseRecorded};
use super::types::{
    Advance, AdvanceFilter, Allocation, DeductionOutcome, DeductionRequest, MetadataUpdate,
};

/// Persistence operations for ledger entries, allocations and expenses.
///
/// Every method is a single atomic unit. `deduct`, `refund` and
/// `record_expense` must run their check-and-write under one lock or
/// transaction so that concurrent callers cannot both pass a balance check
/// only one of them could satisfy.
#[async_trait]
pub trait AdvanceStore: Send + Sync {
    /// Short backend name for logs and the health endpoint.
    fn backend_name(&self) -> &'static str;

    /// Persists a validated new entry.
    async fn insert_advance(&self, advance: Advance) -> Result<Advance, AdvanceError>;

    /// Loads an entry by id, soft-deleted ones included.
    async fn find_advance(&self, id: AdvanceId) -> Result<Option<Advance>, AdvanceError>;

    /// Applies descriptive changes to a live entry.
    async fn update_metadata(
        &self,
        id: AdvanceId,
        update: &MetadataUpdate,
        now: DateTime<Utc>,
    ) -> Result<Advance, AdvanceError>;

    /// Marks a live entry deleted.
    async fn soft_delete(&self, id: AdvanceId, now: DateTime<Utc>) -> Result<Advance, AdvanceError>;

    /// Removes a soft-deleted entry and its allocation rows for good.
    async fn purge(&self, id: AdvanceId) -> Result<(), AdvanceError>;

    /// Lists entries matching the filter, ordered by `date_received` then `created_at`.
    async fn list_advances(&self, filter: &AdvanceFilter) -> Result<Vec<Advance>, AdvanceError>;

    /// Resolves the target and deducts from it, appending an allocation row.
    async fn deduct(
        &self,
        request: &DeductionRequest,
        now: DateTime<Utc>,
    ) -> Result<DeductionOutcome, AdvanceError>;

    /// Marks a live entry refunded.
    async fn refund(&self, id: AdvanceId, now: DateTime<Utc>) -> Result<Advance, AdvanceError>;

    /// Inserts the expense and, if requested, the matching deduction as one unit.
    ///
    /// The expense is charged in the resolved entry's currency only; nothing is
    /// persisted unless both halves succeed.
    async fn record_expense(
        &self,
        expense: Expense,
        deduction: Option<&DeductionRequest>,
        now: DateTime<Utc>,
    ) -> Result<ExpenseRecorded, AdvanceError>;

    /// Lists allocation rows for an entry, oldest first.
    async fn list_allocations(
        &self,
        advance_id: AdvanceId,
    ) -> Result<Vec<Allocation>, AdvanceError>;

    /// Lists expenses matching the filter, ordered by `expense_date` then `created_at`.
    async fn list_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>, AdvanceError>;
}

/// Only soft-deleted entries may be purged.
///
/// # Errors
///
/// Returns `InvalidStateTransition` for a live entry.
pub fn ensure_purgeable(advance: &Advance) -> Result<(), AdvanceError> {
    if advance.is_live() {
        return Err(AdvanceError::invalid_state(
            advance.id,
            "only soft-deleted entries can be purged",
        ));
    }
    Ok(())
}

/// Returns the entry if it exists and is live.
///
/// # Errors
///
/// Returns `NotFound` otherwise.
pub fn require_live(id: AdvanceId, advance: Option<Advance>) -> Result<Advance, AdvanceError> {
    advance
        .filter(Advance::is_live)
        .ok_or(AdvanceError::NotFound(id))
}

//! In-memory store for embedded single-user mode and tests.
//!
//! One `tokio::sync::Mutex` guards all state. Each operation works on copies
//! and commits only after every check has passed, so a failed call leaves
//! nothing behind.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lexledger_shared::types::AdvanceId;
use tokio::sync::Mutex;

use super::allocation::AllocationEngine;
use super::error::AdvanceError;
use super::expense::{Expense, ExpenseFilter, ExpenseRecorded};
use super::store::{AdvanceStore, ensure_purgeable, require_live};
use super::types::{
    Advance, AdvanceFilter, Allocation, DeductionOutcome, DeductionRequest, DeductionTarget,
    MetadataUpdate,
};

#[derive(Debug, Default)]
struct State {
    advances: HashMap<AdvanceId, Advance>,
    allocations: Vec<Allocation>,
    expenses: Vec<Expense>,
}

impl State {
    fn resolve(&self, target: &DeductionTarget) -> Result<Advance, AdvanceError> {
        match target {
            DeductionTarget::Entry(id) => require_live(*id, self.advances.get(id).cloned()),
            DeductionTarget::Oldest(selector) => selector
                .pick(self.advances.values())
                .cloned()
                .ok_or_else(|| AdvanceError::NoMatchingAdvance(selector.describe())),
        }
    }
}

/// Ledger store kept entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryAdvanceStore {
    state: Mutex<State>,
}

impl MemoryAdvanceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdvanceStore for MemoryAdvanceStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert_advance(&self, advance: Advance) -> Result<Advance, AdvanceError> {
        let mut state = self.state.lock().await;
        if state.advances.contains_key(&advance.id) {
            return Err(AdvanceError::Storage(format!(
                "duplicate advance id {}",
                advance.id
            )));
        }
        state.advances.insert(advance.id, advance.clone());
        Ok(advance)
    }

    async fn find_advance(&self, id: AdvanceId) -> Result<Option<Advance>, AdvanceError> {
        Ok(self.state.lock().await.advances.get(&id).cloned())
    }

    async fn update_metadata(
        &self,
        id: AdvanceId,
        update: &MetadataUpdate,
        now: DateTime<Utc>,
    ) -> Result<Advance, AdvanceError> {
        let mut state = self.state.lock().await;
        let mut advance = require_live(id, state.advances.get(&id).cloned())?;
        update.apply_to(&mut advance, now);
        state.advances.insert(id, advance.clone());
        Ok(advance)
    }

    async fn soft_delete(
        &self,
        id: AdvanceId,
        now: DateTime<Utc>,
    ) -> Result<Advance, AdvanceError> {
        let mut state = self.state.lock().await;
        let mut advance = require_live(id, state.advances.get(&id).cloned())?;
        advance.deleted_at = Some(now);
        advance.updated_at = now;
        state.advances.insert(id, advance.clone());
        Ok(advance)
    }

    async fn purge(&self, id: AdvanceId) -> Result<(), AdvanceError> {
        let mut state = self.state.lock().await;
        let advance = state.advances.get(&id).ok_or(AdvanceError::NotFound(id))?;
        ensure_purgeable(advance)?;
        state.advances.remove(&id);
        state.allocations.retain(|row| row.advance_id != id);
        Ok(())
    }

    async fn list_advances(&self, filter: &AdvanceFilter) -> Result<Vec<Advance>, AdvanceError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Advance> = state
            .advances
            .values()
            .filter(|advance| filter.matches(advance))
            .cloned()
            .collect();
        rows.sort_by(Advance::age_order);
        Ok(rows)
    }

    async fn deduct(
        &self,
        request: &DeductionRequest,
        now: DateTime<Utc>,
    ) -> Result<DeductionOutcome, AdvanceError> {
        let mut state = self.state.lock().await;
        let mut advance = state.resolve(&request.target)?;
        let allocation = AllocationEngine::apply_deduction(
            &mut advance,
            request.amount,
            request.note.clone(),
            now,
        )?;

        state.advances.insert(advance.id, advance.clone());
        state.allocations.push(allocation.clone());
        Ok(DeductionOutcome { advance, allocation })
    }

    async fn refund(&self, id: AdvanceId, now: DateTime<Utc>) -> Result<Advance, AdvanceError> {
        let mut state = self.state.lock().await;
        let mut advance = require_live(id, state.advances.get(&id).cloned())?;
        AllocationEngine::apply_refund(&mut advance, now)?;
        state.advances.insert(id, advance.clone());
        Ok(advance)
    }

    async fn record_expense(
        &self,
        mut expense: Expense,
        deduction: Option<&DeductionRequest>,
        now: DateTime<Utc>,
    ) -> Result<ExpenseRecorded, AdvanceError> {
        let mut state = self.state.lock().await;

        let outcome = match deduction {
            Some(request) => {
                let mut advance = state.resolve(&request.target)?;
                AllocationEngine::check_currency(&advance, &expense.currency)?;
                let allocation = AllocationEngine::apply_deduction(
                    &mut advance,
                    request.amount,
                    request.note.clone(),
                    now,
                )?;
                expense.advance_id = Some(advance.id);
                Some(DeductionOutcome { advance, allocation })
            }
            None => None,
        };

        // commit
        if let Some(outcome) = &outcome {
            state
                .advances
                .insert(outcome.advance.id, outcome.advance.clone());
            state.allocations.push(outcome.allocation.clone());
        }
        state.expenses.push(expense.clone());

        Ok(ExpenseRecorded {
            expense,
            deduction: outcome,
        })
    }

    async fn list_allocations(
        &self,
        advance_id: AdvanceId,
    ) -> Result<Vec<Allocation>, AdvanceError> {
        let state = self.state.lock().await;
        Ok(state
            .allocations
            .iter()
            .filter(|row| row.advance_id == advance_id)
            .cloned()
            .collect())
    }

    async fn list_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>, AdvanceError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Expense> = state
            .expenses
            .iter()
            .filter(|expense| filter.matches(expense))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.expense_date
                .cmp(&b.expense_date)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(rows)
    }
}

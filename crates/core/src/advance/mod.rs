//! Advance & retainer ledger.
//!
//! This module implements the ledger of prepaid and received funds:
//! - Entry types, filters and selectors
//! - Input and patch validation per entry kind
//! - The deduction/refund state machine
//! - Per-currency balance aggregation
//! - Lawyer reimbursement figures
//! - The storage seam and its in-memory implementation
//! - `AdvanceService`, the entry point for every caller

pub mod allocation;
pub mod balance;
pub mod error;
pub mod expense;
pub mod memory;
pub mod reimbursement;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod service_tests;

pub use allocation::AllocationEngine;
pub use balance::BalanceAggregator;
pub use error::AdvanceError;
pub use expense::{Expense, ExpenseFilter, ExpenseFunding, ExpenseRecorded, NewExpense};
pub use memory::MemoryAdvanceStore;
pub use reimbursement::{LawyerBalance, Settlement, compute_lawyer_balance};
pub use service::{AdvanceService, MAX_DEDUCTION_ATTEMPTS};
pub use store::AdvanceStore;
pub use types::{
    Advance, AdvanceFilter, AdvanceKind, AdvancePatch, AdvanceSelector, AdvanceStatus, Allocation,
    BalanceSummary, ClientFundsSummary, CurrencyBalance, DeductionOutcome, DeductionRequest,
    DeductionTarget, MetadataUpdate, NewAdvance,
};

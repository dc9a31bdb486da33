//! Core business logic for Lexledger.
//!
//! This crate contains the advance & retainer ledger with ZERO web or database
//! dependencies. Domain types, validation rules, the deduction state machine
//! and balance calculations live here, along with the `AdvanceStore` seam that
//! the database crate implements.
//!
//! # Modules
//!
//! - `advance` - Ledger entries, deductions, balances and lawyer reimbursement

pub mod advance;

pub use advance::{AdvanceError, AdvanceService, AdvanceStore, MemoryAdvanceStore};

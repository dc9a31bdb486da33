//! Repository abstractions for data access.
//!
//! Repositories implement the ledger's storage seam over `SeaORM`,
//! hiding the SQL details from the rest of the application.

pub mod advance;

pub use advance::AdvanceRepository;

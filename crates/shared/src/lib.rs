//! Shared types, errors, and configuration for Lexledger.
//!
//! This crate provides common types used across all other crates:
//! - Money helpers with decimal precision and currency codes
//! - Typed IDs for type-safe entity references
//! - Application bootstrap errors
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, LedgerBackend};
pub use error::AppError;

//! Common types used across the application.

pub mod id;
pub mod money;

pub use id::*;
pub use money::{
    CurrencyCode, MINOR_UNIT_SCALE, MoneyError, format_amount, max_amount, validate_amount,
};

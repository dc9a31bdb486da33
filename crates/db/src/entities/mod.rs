//! `SeaORM` entities.

pub mod prelude;

pub mod advance_allocations;
pub mod advances;
pub mod expenses;
pub mod sea_orm_active_enums;

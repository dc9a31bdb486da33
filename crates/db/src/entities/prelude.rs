//! Entity re-exports.

pub use super::advance_allocations::Entity as AdvanceAllocations;
pub use super::advances::Entity as Advances;
pub use super::expenses::Entity as Expenses;

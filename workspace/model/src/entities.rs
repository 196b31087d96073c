//! This file serves as the root for all SeaORM entity modules.
//! The entities describe the locally staged expense ledger: pending
//! expenses awaiting approval, their accrued clearing entries, and the
//! receipt attachments linked to them.

pub mod clearing_entry;
pub mod pending_expense;
pub mod receipt;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::clearing_entry::Entity as ClearingEntry;
    pub use super::pending_expense::Entity as PendingExpense;
    pub use super::receipt::Entity as Receipt;
}

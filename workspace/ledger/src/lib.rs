//! The pending ledger: durable, concurrency-safe storage for locally staged
//! expenses awaiting approval, including the accrued sub-ledger (remaining
//! balance plus clearing entries) and the upstream posting outcome fields.
//!
//! All mutating operations serialize on an internal async lock held across
//! their read-modify-write sequence, so concurrent requests against the same
//! record cannot lose updates. Network calls to the upstream accounting
//! system never happen inside this crate and therefore never hold the lock.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DbErr;
use thiserror::Error;

pub use model::entities::pending_expense::{ExpenseStatus, ExpenseType, PendingKind};
pub use model::entities::{clearing_entry, pending_expense, receipt};

mod store;

pub use store::PendingLedger;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    /// Invalid input for the requested operation.
    #[error("{0}")]
    Validation(String),

    /// The actor is not allowed to perform this mutation on this record.
    #[error("{0}")]
    NotPermitted(&'static str),
}

/// The identity on whose behalf a mutation runs. Privileged actors bypass
/// ownership checks but not the status rules.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: true,
        }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: false,
        }
    }
}

/// Input for staging a new expense record.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub expense_type: ExpenseType,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub vendor_id: Option<String>,
    pub vendor_name: String,
    pub reference_number: String,
    pub description: String,
    pub expense_account_id: String,
    pub paid_through_account_id: String,
    pub paid_through_account_name: String,
    pub created_by: String,
}

/// Input for staging a clearing payment against an approved accrued expense.
/// The payment itself goes through the same pending/approved lifecycle.
#[derive(Debug, Clone)]
pub struct NewAccruedPayment {
    pub source_expense_id: i32,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub vendor_id: Option<String>,
    pub vendor_name: String,
    pub reference_number: String,
    pub description: String,
    pub paid_through_account_id: String,
    pub paid_through_account_name: String,
    pub created_by: String,
}

/// Typed partial update for a pending expense. Only the fields listed here
/// are mutable; anything else on the record is owned by the lifecycle.
#[derive(Debug, Clone, Default)]
pub struct ExpensePatch {
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub vendor_id: Option<String>,
    pub vendor_name: Option<String>,
    pub reference_number: Option<String>,
    pub description: Option<String>,
    pub expense_account_id: Option<String>,
    pub paid_through_account_id: Option<String>,
    pub paid_through_account_name: Option<String>,
}

impl ExpensePatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.amount.is_none()
            && self.vendor_id.is_none()
            && self.vendor_name.is_none()
            && self.reference_number.is_none()
            && self.description.is_none()
            && self.expense_account_id.is_none()
            && self.paid_through_account_id.is_none()
            && self.paid_through_account_name.is_none()
    }
}

/// Input for recording a clearing entry against an accrued expense.
#[derive(Debug, Clone)]
pub struct ClearingInput {
    pub amount: Decimal,
    pub paid_through_account_id: String,
    pub paid_through_account_name: String,
    pub date: NaiveDate,
    pub reference_number: String,
    pub source_payment_id: Option<i32>,
}

/// Typed partial update for an existing clearing entry.
#[derive(Debug, Clone, Default)]
pub struct ClearingPatch {
    pub amount: Option<Decimal>,
    pub paid_through_account_id: Option<String>,
    pub paid_through_account_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub reference_number: Option<String>,
}

/// Upstream linkage recorded when a record transitions to approved.
#[derive(Debug, Clone, Default)]
pub struct ApprovalStamp {
    pub zoho_expense_id: Option<String>,
    pub zoho_journal_id: Option<String>,
    pub zoho_response: Option<serde_json::Value>,
}

/// A pending expense with its accrued clearing entries and receipts.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    pub expense: pending_expense::Model,
    pub clearing: Vec<clearing_entry::Model>,
    pub receipts: Vec<receipt::Model>,
}

impl PendingRecord {
    pub fn id(&self) -> i32 {
        self.expense.id
    }
}

#[cfg(test)]
mod tests;

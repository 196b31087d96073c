use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

/// Lifecycle of a locally staged record. `Approved` and `Rejected` are
/// terminal; a record never returns to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum ExpenseStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// What the record becomes upstream once approved: an ordinary Zoho Books
/// expense, or a journal entry clearing an accrued liability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum PendingKind {
    #[sea_orm(string_value = "expense")]
    Expense,
    #[sea_orm(string_value = "accrued_payment")]
    AccruedPayment,
}

/// Whether the paid-through account is a real cash/bank account or the
/// synthetic accrued-liability account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum ExpenseType {
    #[sea_orm(string_value = "ordinary")]
    Ordinary,
    #[sea_orm(string_value = "accrued")]
    Accrued,
}

/// A locally staged expense-like transaction awaiting admin approval before
/// being posted to the upstream accounting system.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pending_expenses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub status: ExpenseStatus,
    pub kind: PendingKind,
    pub expense_type: ExpenseType,
    /// Transaction date as entered on the form.
    pub date: NaiveDate,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
    pub reference_number: String,
    pub description: String,
    pub vendor_id: Option<String>,
    pub vendor_name: String,
    pub expense_account_id: String,
    pub paid_through_account_id: String,
    pub paid_through_account_name: String,
    /// User who created the record; drives per-user visibility.
    pub created_by: String,
    /// Remaining unpaid amount of an accrued expense. `None` for ordinary
    /// expenses and for accrued-payment records.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub balance: Option<Decimal>,
    /// Upstream posting outcome, populated during approval.
    pub zoho_posted: bool,
    pub zoho_expense_id: Option<String>,
    pub zoho_journal_id: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub zoho_response: Option<Json>,
    pub zoho_error: Option<String>,
    pub zoho_attachment_error: Option<String>,
    /// Back-reference from an accrued-payment record to the accrued expense
    /// it clears.
    pub source_expense_id: Option<i32>,
    pub created_at: DateTimeUtc,
    pub approved_at: Option<DateTimeUtc>,
    pub rejected_at: Option<DateTimeUtc>,
    pub cleared_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::clearing_entry::Entity")]
    ClearingEntry,
    #[sea_orm(has_many = "super::receipt::Entity")]
    Receipt,
    /// Self-referencing link from a clearing payment to its source accrued
    /// expense.
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::SourceExpenseId",
        to = "Column::Id",
        on_delete = "SetNull"
    )]
    SourceExpense,
}

impl Related<super::clearing_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClearingEntry.def()
    }
}

impl Related<super::receipt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receipt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

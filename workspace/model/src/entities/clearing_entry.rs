use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use super::pending_expense;

/// A partial or full cash payment that reduces an accrued expense's
/// remaining balance. The paid-through account here is always a real
/// cash/bank account, never the accrued-liability account itself.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "clearing_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// The accrued expense this entry clears against.
    pub expense_id: i32,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
    pub paid_through_account_id: String,
    pub paid_through_account_name: String,
    pub date: NaiveDate,
    pub reference_number: String,
    /// The approved accrued-payment record that produced this entry, for
    /// audit linkage. Absent for manually recorded clearings.
    pub source_payment_id: Option<i32>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "pending_expense::Entity",
        from = "Column::ExpenseId",
        to = "pending_expense::Column::Id",
        on_delete = "Cascade"
    )]
    PendingExpense,
}

impl Related<pending_expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PendingExpense.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

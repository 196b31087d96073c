use sea_orm::entity::prelude::*;

use super::pending_expense;

/// A stored receipt attachment reference. The bytes live on disk under the
/// uploads directory; this row only records the stored filename and the
/// public URL it is served from.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "receipts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub expense_id: i32,
    pub filename: String,
    pub url: String,
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

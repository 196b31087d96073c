use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create pending_expenses table
        manager
            .create_table(
                Table::create()
                    .table(PendingExpenses::Table)
                    .if_not_exists()
                    .col(pk_auto(PendingExpenses::Id))
                    .col(string(PendingExpenses::Status).string_len(20))
                    .col(string(PendingExpenses::Kind).string_len(20))
                    .col(string(PendingExpenses::ExpenseType).string_len(20))
                    .col(date(PendingExpenses::Date))
                    .col(decimal(PendingExpenses::Amount).decimal_len(16, 4))
                    .col(string(PendingExpenses::ReferenceNumber))
                    .col(string(PendingExpenses::Description))
                    .col(string_null(PendingExpenses::VendorId))
                    .col(string(PendingExpenses::VendorName))
                    .col(string(PendingExpenses::ExpenseAccountId))
                    .col(string(PendingExpenses::PaidThroughAccountId))
                    .col(string(PendingExpenses::PaidThroughAccountName))
                    .col(string(PendingExpenses::CreatedBy))
                    .col(decimal_null(PendingExpenses::Balance).decimal_len(16, 4))
                    .col(boolean(PendingExpenses::ZohoPosted).default(false))
                    .col(string_null(PendingExpenses::ZohoExpenseId))
                    .col(string_null(PendingExpenses::ZohoJournalId))
                    .col(json_null(PendingExpenses::ZohoResponse))
                    .col(string_null(PendingExpenses::ZohoError))
                    .col(string_null(PendingExpenses::ZohoAttachmentError))
                    .col(integer_null(PendingExpenses::SourceExpenseId))
                    .col(timestamp_with_time_zone(PendingExpenses::CreatedAt))
                    .col(timestamp_with_time_zone_null(PendingExpenses::ApprovedAt))
                    .col(timestamp_with_time_zone_null(PendingExpenses::RejectedAt))
                    .col(timestamp_with_time_zone_null(PendingExpenses::ClearedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pending_expenses_source_expense")
                            .from(PendingExpenses::Table, PendingExpenses::SourceExpenseId)
                            .to(PendingExpenses::Table, PendingExpenses::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create clearing_entries table
        manager
            .create_table(
                Table::create()
                    .table(ClearingEntries::Table)
                    .if_not_exists()
                    .col(pk_auto(ClearingEntries::Id))
                    .col(integer(ClearingEntries::ExpenseId))
                    .col(decimal(ClearingEntries::Amount).decimal_len(16, 4))
                    .col(string(ClearingEntries::PaidThroughAccountId))
                    .col(string(ClearingEntries::PaidThroughAccountName))
                    .col(date(ClearingEntries::Date))
                    .col(string(ClearingEntries::ReferenceNumber))
                    .col(integer_null(ClearingEntries::SourcePaymentId))
                    .col(timestamp_with_time_zone(ClearingEntries::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_clearing_entries_expense")
                            .from(ClearingEntries::Table, ClearingEntries::ExpenseId)
                            .to(PendingExpenses::Table, PendingExpenses::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create receipts table
        manager
            .create_table(
                Table::create()
                    .table(Receipts::Table)
                    .if_not_exists()
                    .col(pk_auto(Receipts::Id))
                    .col(integer(Receipts::ExpenseId))
                    .col(string(Receipts::Filename))
                    .col(string(Receipts::Url))
                    .col(timestamp_with_time_zone(Receipts::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_receipts_expense")
                            .from(Receipts::Table, Receipts::ExpenseId)
                            .to(PendingExpenses::Table, PendingExpenses::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Listing queries filter on these constantly
        manager
            .create_index(
                Index::create()
                    .name("idx_pending_expenses_status")
                    .table(PendingExpenses::Table)
                    .col(PendingExpenses::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pending_expenses_paid_through")
                    .table(PendingExpenses::Table)
                    .col(PendingExpenses::PaidThroughAccountId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order to avoid foreign key constraints
        manager
            .drop_table(Table::drop().table(Receipts::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ClearingEntries::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(PendingExpenses::Table).to_owned())
            .await?;

        Ok(())
    }
}

// Define identifiers for all tables

#[derive(DeriveIden)]
enum PendingExpenses {
    Table,
    Id,
    Status,
    Kind,
    ExpenseType,
    Date,
    Amount,
    ReferenceNumber,
    Description,
    VendorId,
    VendorName,
    ExpenseAccountId,
    PaidThroughAccountId,
    PaidThroughAccountName,
    CreatedBy,
    Balance,
    ZohoPosted,
    ZohoExpenseId,
    ZohoJournalId,
    ZohoResponse,
    ZohoError,
    ZohoAttachmentError,
    SourceExpenseId,
    CreatedAt,
    ApprovedAt,
    RejectedAt,
    ClearedAt,
}

#[derive(DeriveIden)]
enum ClearingEntries {
    Table,
    Id,
    ExpenseId,
    Amount,
    PaidThroughAccountId,
    PaidThroughAccountName,
    Date,
    ReferenceNumber,
    SourcePaymentId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Receipts {
    Table,
    Id,
    ExpenseId,
    Filename,
    Url,
    CreatedAt,
}

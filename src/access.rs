//! Visibility filtering for non-privileged users.

use ledger::PendingRecord;

use crate::auth::CurrentUser;

/// Whether the user may see this record: admins see everything, others see
/// records they created or records paid through an allow-listed account.
pub fn can_view(record: &PendingRecord, user: &CurrentUser) -> bool {
    user.is_admin
        || record.expense.created_by == user.user_id
        || user
            .allowed_account_ids
            .contains(&record.expense.paid_through_account_id)
}

/// Restrict a listing to the records the user may see.
pub fn filter_visible(records: Vec<PendingRecord>, user: &CurrentUser) -> Vec<PendingRecord> {
    if user.is_admin {
        return records;
    }
    records
        .into_iter()
        .filter(|record| can_view(record, user))
        .collect()
}

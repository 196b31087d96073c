use chrono::{Datelike, Months, NaiveDate, Utc};
use migration::{Migrator, MigratorTrait};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, Database};

use crate::store::month_bounds;
use crate::{
    Actor, ApprovalStamp, ClearingInput, ExpensePatch, ExpenseStatus, ExpenseType, LedgerError,
    NewAccruedPayment, NewExpense, PendingLedger,
};

async fn setup_ledger() -> PendingLedger {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");
    Migrator::up(&db, None).await.expect("Migrations failed");
    PendingLedger::new(db)
}

fn new_expense(expense_type: ExpenseType, amount: i64, created_by: &str) -> NewExpense {
    NewExpense {
        expense_type,
        date: Utc::now().date_naive(),
        amount: Decimal::from(amount),
        vendor_id: Some("vendor-1".to_string()),
        vendor_name: "Acme Supplies".to_string(),
        reference_number: String::new(),
        description: "test expense".to_string(),
        expense_account_id: "exp-500".to_string(),
        paid_through_account_id: "cash-100".to_string(),
        paid_through_account_name: "Petty Cash".to_string(),
        created_by: created_by.to_string(),
    }
}

fn clearing(amount: i64) -> ClearingInput {
    ClearingInput {
        amount: Decimal::from(amount),
        paid_through_account_id: "bank-200".to_string(),
        paid_through_account_name: "Main Bank".to_string(),
        date: Utc::now().date_naive(),
        reference_number: String::new(),
        source_payment_id: None,
    }
}

#[tokio::test]
async fn create_initializes_accrued_balance() {
    let ledger = setup_ledger().await;

    let accrued = ledger
        .create(new_expense(ExpenseType::Accrued, 1000, "user-1"))
        .await
        .unwrap();
    assert_eq!(accrued.expense.status, ExpenseStatus::Pending);
    assert_eq!(accrued.expense.balance, Some(Decimal::from(1000)));

    let ordinary = ledger
        .create(new_expense(ExpenseType::Ordinary, 50, "user-1"))
        .await
        .unwrap();
    assert_eq!(ordinary.expense.balance, None);
}

#[tokio::test]
async fn create_rejects_non_positive_amount() {
    let ledger = setup_ledger().await;

    let result = ledger
        .create(new_expense(ExpenseType::Ordinary, 0, "user-1"))
        .await;
    assert!(matches!(result, Err(LedgerError::Validation(_))));

    let result = ledger
        .create(new_expense(ExpenseType::Ordinary, -10, "user-1"))
        .await;
    assert!(matches!(result, Err(LedgerError::Validation(_))));
}

#[tokio::test]
async fn update_recomputes_accrued_balance() {
    let ledger = setup_ledger().await;
    let record = ledger
        .create(new_expense(ExpenseType::Accrued, 1000, "user-1"))
        .await
        .unwrap();

    let patch = ExpensePatch {
        amount: Some(Decimal::from(800)),
        ..Default::default()
    };
    let updated = ledger
        .update(record.id(), patch, &Actor::user("user-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.expense.amount, Decimal::from(800));
    assert_eq!(updated.expense.balance, Some(Decimal::from(800)));
}

#[tokio::test]
async fn update_enforces_ownership_and_status() {
    let ledger = setup_ledger().await;
    let record = ledger
        .create(new_expense(ExpenseType::Ordinary, 50, "user-1"))
        .await
        .unwrap();

    // Another non-admin user cannot touch it
    let patch = ExpensePatch {
        description: Some("hijacked".to_string()),
        ..Default::default()
    };
    let result = ledger
        .update(record.id(), patch.clone(), &Actor::user("user-2"))
        .await;
    assert!(matches!(result, Err(LedgerError::NotPermitted(_))));

    // The record is unchanged after the failed attempt
    let reloaded = ledger.get(record.id()).await.unwrap().unwrap();
    assert_eq!(reloaded.expense, record.expense);

    // Once approved, even the owner (and admins) cannot edit
    assert!(ledger
        .approve(record.id(), ApprovalStamp::default())
        .await
        .unwrap());
    let result = ledger
        .update(record.id(), patch.clone(), &Actor::user("user-1"))
        .await;
    assert!(matches!(result, Err(LedgerError::NotPermitted(_))));
    let result = ledger.update(record.id(), patch, &Actor::admin("boss")).await;
    assert!(matches!(result, Err(LedgerError::NotPermitted(_))));
}

#[tokio::test]
async fn update_missing_record_returns_none() {
    let ledger = setup_ledger().await;
    let result = ledger
        .update(9999, ExpensePatch::default(), &Actor::admin("boss"))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn delete_follows_same_rules_as_update() {
    let ledger = setup_ledger().await;
    let record = ledger
        .create(new_expense(ExpenseType::Ordinary, 50, "user-1"))
        .await
        .unwrap();

    let result = ledger.delete(record.id(), &Actor::user("user-2")).await;
    assert!(matches!(result, Err(LedgerError::NotPermitted(_))));

    assert!(ledger
        .delete(record.id(), &Actor::user("user-1"))
        .await
        .unwrap());
    assert!(ledger.get(record.id()).await.unwrap().is_none());

    // Deleting again reports absence rather than failing
    assert!(!ledger
        .delete(record.id(), &Actor::user("user-1"))
        .await
        .unwrap());
}

#[tokio::test]
async fn approve_is_idempotent_and_stamps_linkage() {
    let ledger = setup_ledger().await;
    let record = ledger
        .create(new_expense(ExpenseType::Ordinary, 50, "user-1"))
        .await
        .unwrap();

    let stamp = ApprovalStamp {
        zoho_expense_id: Some("zoho-123".to_string()),
        zoho_response: Some(serde_json::json!({"code": 0})),
        ..Default::default()
    };
    assert!(ledger.approve(record.id(), stamp).await.unwrap());

    let approved = ledger.get(record.id()).await.unwrap().unwrap();
    assert_eq!(approved.expense.status, ExpenseStatus::Approved);
    assert!(approved.expense.zoho_posted);
    assert_eq!(approved.expense.zoho_expense_id.as_deref(), Some("zoho-123"));
    assert!(approved.expense.approved_at.is_some());

    // Re-approval succeeds without touching the record
    let stamp = ApprovalStamp {
        zoho_expense_id: Some("zoho-456".to_string()),
        ..Default::default()
    };
    assert!(ledger.approve(record.id(), stamp).await.unwrap());
    let reloaded = ledger.get(record.id()).await.unwrap().unwrap();
    assert_eq!(reloaded.expense, approved.expense);

    // Approving a missing record reports absence
    assert!(!ledger.approve(9999, ApprovalStamp::default()).await.unwrap());
}

#[tokio::test]
async fn reject_is_terminal() {
    let ledger = setup_ledger().await;
    let record = ledger
        .create(new_expense(ExpenseType::Ordinary, 50, "user-1"))
        .await
        .unwrap();

    assert!(ledger.reject(record.id()).await.unwrap());
    let rejected = ledger.get(record.id()).await.unwrap().unwrap();
    assert_eq!(rejected.expense.status, ExpenseStatus::Rejected);
    assert!(rejected.expense.rejected_at.is_some());

    // Neither approval nor a second rejection moves it anywhere
    assert!(ledger
        .approve(record.id(), ApprovalStamp::default())
        .await
        .unwrap());
    assert!(!ledger.reject(record.id()).await.unwrap());
    let reloaded = ledger.get(record.id()).await.unwrap().unwrap();
    assert_eq!(reloaded.expense.status, ExpenseStatus::Rejected);
}

#[tokio::test]
async fn clear_accrued_lifecycle() {
    // Scenario: accrued expense of 1000, cleared in two payments
    let ledger = setup_ledger().await;
    let record = ledger
        .create(new_expense(ExpenseType::Accrued, 1000, "user-1"))
        .await
        .unwrap();
    assert_eq!(record.expense.balance, Some(Decimal::from(1000)));

    // Not clearable while pending
    assert!(ledger
        .clear_accrued(record.id(), clearing(400))
        .await
        .unwrap()
        .is_none());

    assert!(ledger
        .approve(record.id(), ApprovalStamp::default())
        .await
        .unwrap());
    let approved = ledger.get(record.id()).await.unwrap().unwrap();
    assert_eq!(approved.expense.balance, Some(Decimal::from(1000)));

    let after_first = ledger
        .clear_accrued(record.id(), clearing(400))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_first.expense.balance, Some(Decimal::from(600)));
    assert_eq!(after_first.clearing.len(), 1);
    assert!(after_first.expense.cleared_at.is_none());

    let after_second = ledger
        .clear_accrued(record.id(), clearing(600))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_second.expense.balance, Some(Decimal::ZERO));
    assert_eq!(after_second.clearing.len(), 2);
    assert!(after_second.expense.cleared_at.is_some());

    // Fully cleared records disappear from the open view only
    let open = ledger.list_accrued(false).await.unwrap();
    assert!(open.iter().all(|r| r.id() != record.id()));
    let all = ledger.list_accrued(true).await.unwrap();
    assert!(all.iter().any(|r| r.id() == record.id()));
}

#[tokio::test]
async fn clear_accrued_rejects_invalid_targets() {
    let ledger = setup_ledger().await;

    // Missing record
    assert!(ledger.clear_accrued(9999, clearing(100)).await.unwrap().is_none());

    // Ordinary expense, even when approved
    let ordinary = ledger
        .create(new_expense(ExpenseType::Ordinary, 100, "user-1"))
        .await
        .unwrap();
    ledger
        .approve(ordinary.id(), ApprovalStamp::default())
        .await
        .unwrap();
    assert!(ledger
        .clear_accrued(ordinary.id(), clearing(50))
        .await
        .unwrap()
        .is_none());

    // Non-positive amounts
    let accrued = ledger
        .create(new_expense(ExpenseType::Accrued, 100, "user-1"))
        .await
        .unwrap();
    ledger
        .approve(accrued.id(), ApprovalStamp::default())
        .await
        .unwrap();
    assert!(ledger
        .clear_accrued(accrued.id(), clearing(0))
        .await
        .unwrap()
        .is_none());
    assert!(ledger
        .clear_accrued(accrued.id(), clearing(-5))
        .await
        .unwrap()
        .is_none());

    // Nothing was recorded by the failed attempts
    let reloaded = ledger.get(accrued.id()).await.unwrap().unwrap();
    assert!(reloaded.clearing.is_empty());
    assert_eq!(reloaded.expense.balance, Some(Decimal::from(100)));
}

#[tokio::test]
async fn over_payment_clamps_balance_at_zero() {
    let ledger = setup_ledger().await;
    let record = ledger
        .create(new_expense(ExpenseType::Accrued, 500, "user-1"))
        .await
        .unwrap();
    ledger
        .approve(record.id(), ApprovalStamp::default())
        .await
        .unwrap();

    let cleared = ledger
        .clear_accrued(record.id(), clearing(800))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cleared.expense.balance, Some(Decimal::ZERO));
    assert!(cleared.expense.cleared_at.is_some());
}

#[tokio::test]
async fn concurrent_clears_serialize() {
    // Scenario: two 300 clears against a 500 balance must end at exactly 0
    let ledger = setup_ledger().await;
    let record = ledger
        .create(new_expense(ExpenseType::Accrued, 500, "user-1"))
        .await
        .unwrap();
    ledger
        .approve(record.id(), ApprovalStamp::default())
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        ledger.clear_accrued(record.id(), clearing(300)),
        ledger.clear_accrued(record.id(), clearing(300)),
    );
    assert!(first.unwrap().is_some());
    assert!(second.unwrap().is_some());

    let reloaded = ledger.get(record.id()).await.unwrap().unwrap();
    assert_eq!(reloaded.expense.balance, Some(Decimal::ZERO));
    assert_eq!(reloaded.clearing.len(), 2);
}

#[tokio::test]
async fn clearing_entry_edits_recompute_balance() {
    let ledger = setup_ledger().await;
    let record = ledger
        .create(new_expense(ExpenseType::Accrued, 1000, "user-1"))
        .await
        .unwrap();
    ledger
        .approve(record.id(), ApprovalStamp::default())
        .await
        .unwrap();
    let cleared = ledger
        .clear_accrued(record.id(), clearing(400))
        .await
        .unwrap()
        .unwrap();
    let entry_id = cleared.clearing[0].id;

    let patch = crate::ClearingPatch {
        amount: Some(Decimal::from(1000)),
        ..Default::default()
    };
    let updated = ledger
        .update_clearing(record.id(), entry_id, patch)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.amount, Decimal::from(1000));

    let reloaded = ledger.get(record.id()).await.unwrap().unwrap();
    assert_eq!(reloaded.expense.balance, Some(Decimal::ZERO));
    assert!(reloaded.expense.cleared_at.is_some());

    // Removing the entry restores the full balance
    assert!(ledger
        .delete_clearing(record.id(), entry_id)
        .await
        .unwrap());
    let reloaded = ledger.get(record.id()).await.unwrap().unwrap();
    assert_eq!(reloaded.expense.balance, Some(Decimal::from(1000)));
    assert!(reloaded.expense.cleared_at.is_none());
    assert!(reloaded.clearing.is_empty());

    // Entries are scoped to their parent expense
    assert!(ledger
        .get_clearing(record.id() + 1, entry_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn list_pending_excludes_decided_records() {
    let ledger = setup_ledger().await;
    let first = ledger
        .create(new_expense(ExpenseType::Ordinary, 10, "user-1"))
        .await
        .unwrap();
    let second = ledger
        .create(new_expense(ExpenseType::Ordinary, 20, "user-1"))
        .await
        .unwrap();
    let third = ledger
        .create(new_expense(ExpenseType::Ordinary, 30, "user-1"))
        .await
        .unwrap();

    ledger
        .approve(first.id(), ApprovalStamp::default())
        .await
        .unwrap();
    ledger.reject(second.id()).await.unwrap();

    let pending = ledger.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id(), third.id());
}

#[tokio::test]
async fn list_approved_defaults_to_current_month() {
    // Scenario: a record dated last month is hidden by the default window
    let ledger = setup_ledger().await;
    let last_month = Utc::now()
        .date_naive()
        .checked_sub_months(Months::new(1))
        .unwrap();

    let mut input = new_expense(ExpenseType::Ordinary, 75, "user-1");
    input.date = last_month;
    let old = ledger.create(input).await.unwrap();
    ledger
        .approve(old.id(), ApprovalStamp::default())
        .await
        .unwrap();

    let current = ledger
        .create(new_expense(ExpenseType::Ordinary, 25, "user-1"))
        .await
        .unwrap();
    ledger
        .approve(current.id(), ApprovalStamp::default())
        .await
        .unwrap();

    let defaulted = ledger.list_approved(None, None, true).await.unwrap();
    assert!(defaulted.iter().any(|r| r.id() == current.id()));
    assert!(defaulted.iter().all(|r| r.id() != old.id()));

    // An explicit range spanning the old date finds it
    let spanning = ledger
        .list_approved(
            Some(last_month.checked_sub_months(Months::new(1)).unwrap()),
            Some(Utc::now().date_naive().checked_add_months(Months::new(1)).unwrap()),
            true,
        )
        .await
        .unwrap();
    assert!(spanning.iter().any(|r| r.id() == old.id()));

    // With the default disabled and no range, everything approved shows
    let unbounded = ledger.list_approved(None, None, false).await.unwrap();
    assert_eq!(unbounded.len(), 2);
}

#[tokio::test]
async fn list_payments_filters_by_status() {
    let ledger = setup_ledger().await;
    let accrued = ledger
        .create(new_expense(ExpenseType::Accrued, 900, "user-1"))
        .await
        .unwrap();
    ledger
        .approve(accrued.id(), ApprovalStamp::default())
        .await
        .unwrap();

    let payment = ledger
        .create_payment(NewAccruedPayment {
            source_expense_id: accrued.id(),
            date: Utc::now().date_naive(),
            amount: Decimal::from(300),
            vendor_id: None,
            vendor_name: "Acme Supplies".to_string(),
            reference_number: String::new(),
            description: "clearing payment".to_string(),
            paid_through_account_id: "bank-200".to_string(),
            paid_through_account_name: "Main Bank".to_string(),
            created_by: "admin".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(payment.expense.source_expense_id, Some(accrued.id()));

    // Payments never show up in the approved-expenses view
    let approved = ledger.list_approved(None, None, false).await.unwrap();
    assert!(approved.iter().all(|r| r.id() != payment.id()));

    let all = ledger.list_payments(None).await.unwrap();
    assert_eq!(all.len(), 1);

    let approved_only = ledger
        .list_payments(Some(ExpenseStatus::Approved))
        .await
        .unwrap();
    assert!(approved_only.is_empty());

    ledger
        .approve(payment.id(), ApprovalStamp::default())
        .await
        .unwrap();
    let approved_only = ledger
        .list_payments(Some(ExpenseStatus::Approved))
        .await
        .unwrap();
    assert_eq!(approved_only.len(), 1);
}

#[tokio::test]
async fn pending_totals_sum_per_account() {
    let ledger = setup_ledger().await;

    let mut input = new_expense(ExpenseType::Ordinary, 100, "user-1");
    input.paid_through_account_id = "cash-100".to_string();
    ledger.create(input).await.unwrap();

    let mut input = new_expense(ExpenseType::Ordinary, 250, "user-2");
    input.paid_through_account_id = "cash-100".to_string();
    ledger.create(input).await.unwrap();

    let mut input = new_expense(ExpenseType::Ordinary, 40, "user-1");
    input.paid_through_account_id = "bank-200".to_string();
    let other = ledger.create(input).await.unwrap();

    // Approved records no longer count against the pending total
    let mut input = new_expense(ExpenseType::Ordinary, 999, "user-1");
    input.paid_through_account_id = "cash-100".to_string();
    let approved = ledger.create(input).await.unwrap();
    ledger
        .approve(approved.id(), ApprovalStamp::default())
        .await
        .unwrap();

    let total = ledger.pending_total_for_account("cash-100").await.unwrap();
    assert_eq!(total, Decimal::from(350));

    let total = ledger
        .pending_total_for_account(&other.expense.paid_through_account_id)
        .await
        .unwrap();
    assert_eq!(total, Decimal::from(40));

    let total = ledger.pending_total_for_account("missing").await.unwrap();
    assert_eq!(total, Decimal::ZERO);
}

#[tokio::test]
async fn receipts_attach_in_any_status() {
    let ledger = setup_ledger().await;
    let record = ledger
        .create(new_expense(ExpenseType::Ordinary, 50, "user-1"))
        .await
        .unwrap();

    let updated = ledger
        .add_receipt(record.id(), "a.pdf", "/uploads/1/a.pdf")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.receipts.len(), 1);

    ledger
        .approve(record.id(), ApprovalStamp::default())
        .await
        .unwrap();
    let updated = ledger
        .add_receipt(record.id(), "b.pdf", "/uploads/1/b.pdf")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.receipts.len(), 2);

    assert!(ledger
        .add_receipt(9999, "c.pdf", "/uploads/x/c.pdf")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn post_failure_keeps_record_pending() {
    // Scenario: upstream failure annotates the record without moving it
    let ledger = setup_ledger().await;
    let record = ledger
        .create(new_expense(ExpenseType::Ordinary, 50, "user-1"))
        .await
        .unwrap();

    assert!(ledger
        .record_post_failure(record.id(), "upstream returned 502")
        .await
        .unwrap());

    let reloaded = ledger.get(record.id()).await.unwrap().unwrap();
    assert_eq!(reloaded.expense.status, ExpenseStatus::Pending);
    assert!(!reloaded.expense.zoho_posted);
    assert_eq!(
        reloaded.expense.zoho_error.as_deref(),
        Some("upstream returned 502")
    );

    let pending = ledger.list_pending().await.unwrap();
    assert!(pending.iter().any(|r| r.id() == record.id()));
}

#[tokio::test]
async fn vendor_names_are_distinct_and_sorted() {
    let ledger = setup_ledger().await;

    let mut input = new_expense(ExpenseType::Ordinary, 10, "user-1");
    input.vendor_name = "Zebra Ltd".to_string();
    ledger.create(input).await.unwrap();

    let mut input = new_expense(ExpenseType::Ordinary, 20, "user-1");
    input.vendor_name = "Acme Supplies".to_string();
    ledger.create(input).await.unwrap();

    let mut input = new_expense(ExpenseType::Ordinary, 30, "user-1");
    input.vendor_name = "Acme Supplies".to_string();
    ledger.create(input).await.unwrap();

    let mut input = new_expense(ExpenseType::Ordinary, 40, "user-1");
    input.vendor_name = String::new();
    ledger.create(input).await.unwrap();

    let names = ledger.vendor_names().await.unwrap();
    assert_eq!(names, vec!["Acme Supplies", "Zebra Ltd"]);
}

#[test]
fn month_bounds_are_end_exclusive() {
    let (start, end) = month_bounds(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    assert_eq!(start, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    assert_eq!(end, NaiveDate::from_ymd_opt(2026, 4, 1).unwrap());

    // December rolls over into the next year
    let (start, end) = month_bounds(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    assert_eq!(start, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
    assert_eq!(end, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    assert_eq!(end.year(), 2026);
}

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    ModelTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use model::entities::pending_expense::{self, ExpenseStatus, ExpenseType, PendingKind};
use model::entities::prelude::{ClearingEntry, PendingExpense, Receipt};
use model::entities::{clearing_entry, receipt};

use crate::{
    Actor, ApprovalStamp, ClearingInput, ClearingPatch, ExpensePatch, LedgerError,
    NewAccruedPayment, NewExpense, PendingRecord,
};

/// Repository over the staged-expense tables.
///
/// Mutations take the internal write lock for their whole read-modify-write
/// sequence; reads and listings run against the last committed state without
/// locking.
#[derive(Clone, Debug)]
pub struct PendingLedger {
    db: DatabaseConnection,
    write_lock: Arc<Mutex<()>>,
}

impl PendingLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    // -------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------

    /// Stage a new expense record. Accrued expenses start with their balance
    /// equal to the full amount.
    #[instrument(skip(self, input), fields(created_by = %input.created_by))]
    pub async fn create(&self, input: NewExpense) -> Result<PendingRecord, LedgerError> {
        if input.amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "amount must be greater than zero".to_string(),
            ));
        }

        let balance = match input.expense_type {
            ExpenseType::Accrued => Some(input.amount),
            ExpenseType::Ordinary => None,
        };

        let _guard = self.write_lock.lock().await;

        let inserted = pending_expense::ActiveModel {
            status: Set(ExpenseStatus::Pending),
            kind: Set(PendingKind::Expense),
            expense_type: Set(input.expense_type),
            date: Set(input.date),
            amount: Set(input.amount),
            reference_number: Set(input.reference_number),
            description: Set(input.description),
            vendor_id: Set(input.vendor_id),
            vendor_name: Set(input.vendor_name),
            expense_account_id: Set(input.expense_account_id),
            paid_through_account_id: Set(input.paid_through_account_id),
            paid_through_account_name: Set(input.paid_through_account_name),
            created_by: Set(input.created_by),
            balance: Set(balance),
            zoho_posted: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(expense_id = inserted.id, "Pending expense staged");

        self.load(inserted).await
    }

    /// Stage a clearing payment against an approved accrued expense. The
    /// payment only touches the source balance once it is itself approved.
    #[instrument(skip(self, input), fields(source_expense_id = input.source_expense_id))]
    pub async fn create_payment(
        &self,
        input: NewAccruedPayment,
    ) -> Result<PendingRecord, LedgerError> {
        if input.amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "amount must be greater than zero".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;

        let inserted = pending_expense::ActiveModel {
            status: Set(ExpenseStatus::Pending),
            kind: Set(PendingKind::AccruedPayment),
            expense_type: Set(ExpenseType::Ordinary),
            date: Set(input.date),
            amount: Set(input.amount),
            reference_number: Set(input.reference_number),
            description: Set(input.description),
            vendor_id: Set(input.vendor_id),
            vendor_name: Set(input.vendor_name),
            expense_account_id: Set(String::new()),
            paid_through_account_id: Set(input.paid_through_account_id),
            paid_through_account_name: Set(input.paid_through_account_name),
            created_by: Set(input.created_by),
            balance: Set(None),
            zoho_posted: Set(false),
            source_expense_id: Set(Some(input.source_expense_id)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(payment_id = inserted.id, "Accrued clearing payment staged");

        self.load(inserted).await
    }

    // -------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------

    /// Fetch a record with its clearing entries and receipts.
    pub async fn get(&self, id: i32) -> Result<Option<PendingRecord>, LedgerError> {
        match PendingExpense::find_by_id(id).one(&self.db).await? {
            Some(expense) => Ok(Some(self.load(expense).await?)),
            None => Ok(None),
        }
    }

    // -------------------------------------------------------------------
    // Mutation while pending
    // -------------------------------------------------------------------

    /// Apply a typed partial update. Records can only be edited while they
    /// are pending; non-privileged actors may only edit their own records.
    /// Changing the amount of an accrued expense recomputes its balance.
    #[instrument(skip(self, patch, actor), fields(expense_id = id, actor = %actor.user_id))]
    pub async fn update(
        &self,
        id: i32,
        patch: ExpensePatch,
        actor: &Actor,
    ) -> Result<Option<PendingRecord>, LedgerError> {
        let _guard = self.write_lock.lock().await;

        let Some(existing) = PendingExpense::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        Self::check_mutable(&existing, actor)?;

        if let Some(amount) = patch.amount {
            if amount <= Decimal::ZERO {
                return Err(LedgerError::Validation(
                    "amount must be greater than zero".to_string(),
                ));
            }
        }

        if patch.is_empty() {
            let record = self.load(existing).await?;
            return Ok(Some(record));
        }

        let amount_changed = patch.amount.is_some();

        let mut active = existing.into_active_model();
        if let Some(date) = patch.date {
            active.date = Set(date);
        }
        if let Some(amount) = patch.amount {
            active.amount = Set(amount);
        }
        if let Some(vendor_id) = patch.vendor_id {
            active.vendor_id = Set(Some(vendor_id));
        }
        if let Some(vendor_name) = patch.vendor_name {
            active.vendor_name = Set(vendor_name);
        }
        if let Some(reference_number) = patch.reference_number {
            active.reference_number = Set(reference_number);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        if let Some(expense_account_id) = patch.expense_account_id {
            active.expense_account_id = Set(expense_account_id);
        }
        if let Some(paid_through_account_id) = patch.paid_through_account_id {
            active.paid_through_account_id = Set(paid_through_account_id);
        }
        if let Some(paid_through_account_name) = patch.paid_through_account_name {
            active.paid_through_account_name = Set(paid_through_account_name);
        }

        let mut updated = active.update(&self.db).await?;
        if amount_changed {
            updated = self.recompute_balance(updated).await?;
        }

        info!(expense_id = updated.id, "Pending expense updated");

        Ok(Some(self.load(updated).await?))
    }

    /// Hard delete. Same ownership/status rule as `update`; clearing entries
    /// and receipts go with the record.
    #[instrument(skip(self, actor), fields(expense_id = id, actor = %actor.user_id))]
    pub async fn delete(&self, id: i32, actor: &Actor) -> Result<bool, LedgerError> {
        let _guard = self.write_lock.lock().await;

        let Some(existing) = PendingExpense::find_by_id(id).one(&self.db).await? else {
            return Ok(false);
        };

        Self::check_mutable(&existing, actor)?;

        existing.delete(&self.db).await?;
        info!(expense_id = id, "Pending expense deleted");
        Ok(true)
    }

    // -------------------------------------------------------------------
    // State transitions
    // -------------------------------------------------------------------

    /// Transition a pending record to approved and attach the upstream
    /// linkage. Approving an already-terminal record is a no-op that still
    /// reports success, so retried approvals stay idempotent.
    #[instrument(skip(self, stamp), fields(expense_id = id))]
    pub async fn approve(&self, id: i32, stamp: ApprovalStamp) -> Result<bool, LedgerError> {
        let _guard = self.write_lock.lock().await;

        let Some(existing) = PendingExpense::find_by_id(id).one(&self.db).await? else {
            return Ok(false);
        };
        if existing.status != ExpenseStatus::Pending {
            return Ok(true);
        }

        let needs_balance = existing.kind == PendingKind::Expense
            && existing.expense_type == ExpenseType::Accrued
            && existing.balance.is_none();
        let amount = existing.amount;
        let posted = stamp.zoho_expense_id.is_some()
            || stamp.zoho_journal_id.is_some()
            || stamp.zoho_response.is_some();

        let mut active = existing.into_active_model();
        active.status = Set(ExpenseStatus::Approved);
        active.approved_at = Set(Some(Utc::now()));
        if needs_balance {
            active.balance = Set(Some(amount));
        }
        if posted {
            active.zoho_posted = Set(true);
            active.zoho_error = Set(None);
            if let Some(expense_id) = stamp.zoho_expense_id {
                active.zoho_expense_id = Set(Some(expense_id));
            }
            if let Some(journal_id) = stamp.zoho_journal_id {
                active.zoho_journal_id = Set(Some(journal_id));
            }
            if let Some(response) = stamp.zoho_response {
                active.zoho_response = Set(Some(response));
            }
        }
        active.update(&self.db).await?;

        info!(expense_id = id, "Pending expense approved");
        Ok(true)
    }

    /// Transition a pending record to rejected. Terminal; records never
    /// leave the rejected state.
    #[instrument(skip(self), fields(expense_id = id))]
    pub async fn reject(&self, id: i32) -> Result<bool, LedgerError> {
        let _guard = self.write_lock.lock().await;

        let Some(existing) = PendingExpense::find_by_id(id).one(&self.db).await? else {
            return Ok(false);
        };
        if existing.status != ExpenseStatus::Pending {
            return Ok(false);
        }

        let mut active = existing.into_active_model();
        active.status = Set(ExpenseStatus::Rejected);
        active.rejected_at = Set(Some(Utc::now()));
        active.update(&self.db).await?;

        info!(expense_id = id, "Pending expense rejected");
        Ok(true)
    }

    /// Record that the upstream post failed. The record stays pending so the
    /// operator can retry; the error is kept for diagnosis.
    #[instrument(skip(self, error), fields(expense_id = id))]
    pub async fn record_post_failure(&self, id: i32, error: &str) -> Result<bool, LedgerError> {
        let _guard = self.write_lock.lock().await;

        let Some(existing) = PendingExpense::find_by_id(id).one(&self.db).await? else {
            return Ok(false);
        };

        let mut active = existing.into_active_model();
        active.zoho_posted = Set(false);
        active.zoho_error = Set(Some(error.to_string()));
        active.update(&self.db).await?;
        Ok(true)
    }

    /// Record the outcome of best-effort receipt uploads. `None` clears a
    /// previously recorded failure.
    #[instrument(skip(self, errors), fields(expense_id = id))]
    pub async fn set_attachment_errors(
        &self,
        id: i32,
        errors: Option<String>,
    ) -> Result<bool, LedgerError> {
        let _guard = self.write_lock.lock().await;

        let Some(existing) = PendingExpense::find_by_id(id).one(&self.db).await? else {
            return Ok(false);
        };

        let mut active = existing.into_active_model();
        active.zoho_attachment_error = Set(errors);
        active.update(&self.db).await?;
        Ok(true)
    }

    // -------------------------------------------------------------------
    // Receipts
    // -------------------------------------------------------------------

    /// Attach a receipt reference. Allowed in any lifecycle stage.
    #[instrument(skip(self, filename, url), fields(expense_id = id))]
    pub async fn add_receipt(
        &self,
        id: i32,
        filename: &str,
        url: &str,
    ) -> Result<Option<PendingRecord>, LedgerError> {
        let _guard = self.write_lock.lock().await;

        let Some(existing) = PendingExpense::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        receipt::ActiveModel {
            expense_id: Set(existing.id),
            filename: Set(filename.to_string()),
            url: Set(url.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(expense_id = id, filename = %filename, "Receipt attached");

        Ok(Some(self.load(existing).await?))
    }

    // -------------------------------------------------------------------
    // Accrued clearing
    // -------------------------------------------------------------------

    /// Append a clearing entry to an approved accrued expense and recompute
    /// its balance. Over-payments clamp the balance at zero. Returns `None`
    /// when the target is missing or not clearable.
    #[instrument(skip(self, input), fields(expense_id = id))]
    pub async fn clear_accrued(
        &self,
        id: i32,
        input: ClearingInput,
    ) -> Result<Option<PendingRecord>, LedgerError> {
        if input.amount <= Decimal::ZERO {
            return Ok(None);
        }

        let _guard = self.write_lock.lock().await;

        let Some(existing) = PendingExpense::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };
        if existing.status != ExpenseStatus::Approved
            || existing.expense_type != ExpenseType::Accrued
            || existing.kind != PendingKind::Expense
        {
            return Ok(None);
        }

        clearing_entry::ActiveModel {
            expense_id: Set(existing.id),
            amount: Set(input.amount),
            paid_through_account_id: Set(input.paid_through_account_id),
            paid_through_account_name: Set(input.paid_through_account_name),
            date: Set(input.date),
            reference_number: Set(input.reference_number),
            source_payment_id: Set(input.source_payment_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        let updated = self.recompute_balance(existing).await?;

        info!(
            expense_id = updated.id,
            balance = %updated.balance.unwrap_or(Decimal::ZERO),
            "Clearing entry recorded"
        );

        Ok(Some(self.load(updated).await?))
    }

    /// Fetch a single clearing entry scoped to its parent expense.
    pub async fn get_clearing(
        &self,
        expense_id: i32,
        clearing_id: i32,
    ) -> Result<Option<clearing_entry::Model>, LedgerError> {
        let entry = ClearingEntry::find_by_id(clearing_id)
            .filter(clearing_entry::Column::ExpenseId.eq(expense_id))
            .one(&self.db)
            .await?;
        Ok(entry)
    }

    /// Edit a clearing entry and recompute the parent balance.
    #[instrument(skip(self, patch), fields(expense_id = expense_id, clearing_id = clearing_id))]
    pub async fn update_clearing(
        &self,
        expense_id: i32,
        clearing_id: i32,
        patch: ClearingPatch,
    ) -> Result<Option<clearing_entry::Model>, LedgerError> {
        if let Some(amount) = patch.amount {
            if amount <= Decimal::ZERO {
                return Err(LedgerError::Validation(
                    "amount must be greater than zero".to_string(),
                ));
            }
        }

        let _guard = self.write_lock.lock().await;

        let Some(entry) = ClearingEntry::find_by_id(clearing_id)
            .filter(clearing_entry::Column::ExpenseId.eq(expense_id))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let mut active = entry.into_active_model();
        if let Some(amount) = patch.amount {
            active.amount = Set(amount);
        }
        if let Some(paid_through_account_id) = patch.paid_through_account_id {
            active.paid_through_account_id = Set(paid_through_account_id);
        }
        if let Some(paid_through_account_name) = patch.paid_through_account_name {
            active.paid_through_account_name = Set(paid_through_account_name);
        }
        if let Some(date) = patch.date {
            active.date = Set(date);
        }
        if let Some(reference_number) = patch.reference_number {
            active.reference_number = Set(reference_number);
        }
        let updated = active.update(&self.db).await?;

        if let Some(parent) = PendingExpense::find_by_id(expense_id).one(&self.db).await? {
            self.recompute_balance(parent).await?;
        }

        Ok(Some(updated))
    }

    /// Remove a clearing entry and recompute the parent balance.
    #[instrument(skip(self), fields(expense_id = expense_id, clearing_id = clearing_id))]
    pub async fn delete_clearing(
        &self,
        expense_id: i32,
        clearing_id: i32,
    ) -> Result<bool, LedgerError> {
        let _guard = self.write_lock.lock().await;

        let Some(entry) = ClearingEntry::find_by_id(clearing_id)
            .filter(clearing_entry::Column::ExpenseId.eq(expense_id))
            .one(&self.db)
            .await?
        else {
            return Ok(false);
        };

        entry.delete(&self.db).await?;

        if let Some(parent) = PendingExpense::find_by_id(expense_id).one(&self.db).await? {
            self.recompute_balance(parent).await?;
        }

        Ok(true)
    }

    // -------------------------------------------------------------------
    // Listing
    // -------------------------------------------------------------------

    /// Records still awaiting a decision, newest first.
    pub async fn list_pending(&self) -> Result<Vec<PendingRecord>, LedgerError> {
        let expenses = PendingExpense::find()
            .filter(pending_expense::Column::Status.eq(ExpenseStatus::Pending))
            .order_by_desc(pending_expense::Column::CreatedAt)
            .order_by_desc(pending_expense::Column::Id)
            .all(&self.db)
            .await?;
        self.load_all(expenses).await
    }

    /// Approved expenses, optionally date-filtered. With no explicit range
    /// and `default_current_month` set, only the current calendar month is
    /// returned; the end bound is always exclusive.
    pub async fn list_approved(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        default_current_month: bool,
    ) -> Result<Vec<PendingRecord>, LedgerError> {
        let (start, end) = if start_date.is_none() && end_date.is_none() && default_current_month {
            let (s, e) = month_bounds(Utc::now().date_naive());
            (Some(s), Some(e))
        } else {
            (start_date, end_date)
        };

        let mut query = PendingExpense::find()
            .filter(pending_expense::Column::Status.eq(ExpenseStatus::Approved))
            .filter(pending_expense::Column::Kind.eq(PendingKind::Expense));
        if let Some(start) = start {
            query = query.filter(pending_expense::Column::Date.gte(start));
        }
        if let Some(end) = end {
            query = query.filter(pending_expense::Column::Date.lt(end));
        }

        let expenses = query
            .order_by_desc(pending_expense::Column::ApprovedAt)
            .order_by_desc(pending_expense::Column::Id)
            .all(&self.db)
            .await?;
        self.load_all(expenses).await
    }

    /// Approved accrued expenses. Fully cleared records (balance at zero)
    /// are hidden unless `include_cleared` is set.
    pub async fn list_accrued(
        &self,
        include_cleared: bool,
    ) -> Result<Vec<PendingRecord>, LedgerError> {
        let mut query = PendingExpense::find()
            .filter(pending_expense::Column::Status.eq(ExpenseStatus::Approved))
            .filter(pending_expense::Column::ExpenseType.eq(ExpenseType::Accrued))
            .filter(pending_expense::Column::Kind.eq(PendingKind::Expense));
        if !include_cleared {
            query = query.filter(
                Condition::any()
                    .add(pending_expense::Column::Balance.gt(Decimal::ZERO))
                    .add(pending_expense::Column::Balance.is_null()),
            );
        }

        let expenses = query
            .order_by_desc(pending_expense::Column::ApprovedAt)
            .order_by_desc(pending_expense::Column::Id)
            .all(&self.db)
            .await?;
        self.load_all(expenses).await
    }

    /// Clearing payments staged or made against accrued expenses.
    pub async fn list_payments(
        &self,
        status: Option<ExpenseStatus>,
    ) -> Result<Vec<PendingRecord>, LedgerError> {
        let mut query = PendingExpense::find()
            .filter(pending_expense::Column::Kind.eq(PendingKind::AccruedPayment));
        if let Some(status) = status {
            query = query.filter(pending_expense::Column::Status.eq(status));
        }

        let expenses = query
            .order_by_desc(pending_expense::Column::CreatedAt)
            .order_by_desc(pending_expense::Column::Id)
            .all(&self.db)
            .await?;
        self.load_all(expenses).await
    }

    /// Sum of pending amounts charged against a paid-through account. Feeds
    /// the cash dashboard's before-approval projection.
    pub async fn pending_total_for_account(
        &self,
        account_id: &str,
    ) -> Result<Decimal, LedgerError> {
        let amounts: Vec<Decimal> = PendingExpense::find()
            .select_only()
            .column(pending_expense::Column::Amount)
            .filter(pending_expense::Column::Status.eq(ExpenseStatus::Pending))
            .filter(pending_expense::Column::PaidThroughAccountId.eq(account_id))
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(amounts.into_iter().sum())
    }

    /// Distinct vendor names seen on any record, for form dropdowns.
    pub async fn vendor_names(&self) -> Result<Vec<String>, LedgerError> {
        let names: Vec<String> = PendingExpense::find()
            .select_only()
            .column(pending_expense::Column::VendorName)
            .distinct()
            .filter(pending_expense::Column::VendorName.ne(""))
            .order_by_asc(pending_expense::Column::VendorName)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(names)
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    /// Records can only be mutated while pending; non-privileged actors only
    /// touch records they created.
    fn check_mutable(
        expense: &pending_expense::Model,
        actor: &Actor,
    ) -> Result<(), LedgerError> {
        if expense.status != ExpenseStatus::Pending {
            return Err(LedgerError::NotPermitted(
                "only pending records can be modified",
            ));
        }
        if !actor.is_admin && expense.created_by != actor.user_id {
            return Err(LedgerError::NotPermitted(
                "record belongs to another user",
            ));
        }
        Ok(())
    }

    /// Recompute the accrued balance from the full clearing list, clamped at
    /// zero, and maintain the cleared-at stamp. Must run under the write
    /// lock.
    async fn recompute_balance(
        &self,
        expense: pending_expense::Model,
    ) -> Result<pending_expense::Model, LedgerError> {
        if expense.expense_type != ExpenseType::Accrued || expense.kind != PendingKind::Expense {
            return Ok(expense);
        }

        let cleared: Decimal = expense
            .find_related(ClearingEntry)
            .all(&self.db)
            .await?
            .iter()
            .map(|entry| entry.amount)
            .sum();
        let balance = (expense.amount - cleared).max(Decimal::ZERO);
        let previously_cleared_at = expense.cleared_at;

        let mut active = expense.into_active_model();
        active.balance = Set(Some(balance));
        active.cleared_at = if balance.is_zero() {
            Set(Some(previously_cleared_at.unwrap_or_else(Utc::now)))
        } else {
            Set(None)
        };
        Ok(active.update(&self.db).await?)
    }

    async fn load(&self, expense: pending_expense::Model) -> Result<PendingRecord, LedgerError> {
        let clearing = expense
            .find_related(ClearingEntry)
            .order_by_asc(clearing_entry::Column::CreatedAt)
            .order_by_asc(clearing_entry::Column::Id)
            .all(&self.db)
            .await?;
        let receipts = expense
            .find_related(Receipt)
            .order_by_asc(receipt::Column::Id)
            .all(&self.db)
            .await?;
        Ok(PendingRecord {
            expense,
            clearing,
            receipts,
        })
    }

    async fn load_all(
        &self,
        expenses: Vec<pending_expense::Model>,
    ) -> Result<Vec<PendingRecord>, LedgerError> {
        let mut records = Vec::with_capacity(expenses.len());
        for expense in expenses {
            records.push(self.load(expense).await?);
        }
        Ok(records)
    }
}

/// Current calendar month as a half-open range: first of the month up to,
/// but excluding, the first of the next month.
pub(crate) fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    let next = if today.month() == 12 {
        NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
    }
    .unwrap_or(start);
    (start, next)
}

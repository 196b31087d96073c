//! Approval workflow.
//!
//! Drives the transition from a locally staged record to an upstream-posted
//! one. The upstream call runs between ledger operations, so the ledger's
//! write lock is never held across the network. Upstream failures leave the
//! record pending with the error attached; the operator retries by
//! re-approving. Receipt delivery after a successful post is best-effort and
//! never reverts an approval.

use ledger::{
    ApprovalStamp, ClearingInput, ExpenseStatus, ExpenseType, PendingKind, PendingRecord,
    pending_expense,
};

use crate::error::AppError;
use crate::schemas::AppState;
use crate::storage::content_type_for;
use crate::zoho::{
    AttachmentResource, ExpensePayload, JournalLine, JournalPayload, JournalSide,
};

/// Approve a pending record, posting it upstream first. Approving a record
/// that is already decided returns it unchanged without another upstream
/// call.
pub async fn approve(state: &AppState, id: i32) -> Result<PendingRecord, AppError> {
    let record = state
        .ledger
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("pending record not found".to_string()))?;

    if record.expense.status != ExpenseStatus::Pending {
        return Ok(record);
    }

    match record.expense.kind {
        PendingKind::Expense => approve_expense(state, record).await,
        PendingKind::AccruedPayment => approve_accrued_payment(state, record).await,
    }
}

/// Reject a pending record. Terminal, with no upstream interaction.
pub async fn reject(state: &AppState, id: i32) -> Result<(), AppError> {
    let record = state
        .ledger
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("pending record not found".to_string()))?;

    if record.expense.status != ExpenseStatus::Pending {
        return Err(AppError::BadRequest(
            "only pending records can be rejected".to_string(),
        ));
    }

    state.ledger.reject(id).await?;
    Ok(())
}

async fn approve_expense(
    state: &AppState,
    record: PendingRecord,
) -> Result<PendingRecord, AppError> {
    // Built from the record's current columns so edits made while pending
    // are always reflected in what gets posted
    let payload = expense_payload(&record.expense);

    let (zoho_expense_id, response) = match state.zoho.create_expense(&payload).await {
        Ok(result) => result,
        Err(err) => {
            let reason = err.to_string();
            state.ledger.record_post_failure(record.id(), &reason).await?;
            return Err(AppError::BadGateway(reason));
        }
    };

    state
        .ledger
        .approve(
            record.id(),
            ApprovalStamp {
                zoho_expense_id: zoho_expense_id.clone(),
                zoho_journal_id: None,
                zoho_response: Some(response),
            },
        )
        .await?;

    if let Some(upstream_id) = zoho_expense_id.as_deref() {
        push_receipts(state, record.id(), AttachmentResource::Expense, upstream_id).await?;
    }

    reload(state, record.id()).await
}

async fn approve_accrued_payment(
    state: &AppState,
    record: PendingRecord,
) -> Result<PendingRecord, AppError> {
    let Some(source_id) = record.expense.source_expense_id else {
        return Err(AppError::BadRequest(
            "payment record has no source accrued expense".to_string(),
        ));
    };

    let source = state
        .ledger
        .get(source_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("source accrued expense not found".to_string()))?;
    if source.expense.status != ExpenseStatus::Approved
        || source.expense.expense_type != ExpenseType::Accrued
    {
        return Err(AppError::BadRequest(
            "source must be an approved accrued expense".to_string(),
        ));
    }

    let liability_account_id = state
        .coa
        .accrued_liability_account()
        .map(|account| account.account_id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest("accrued liability account is not configured".to_string())
        })?;

    let payload = journal_payload(&record.expense, &liability_account_id);

    let (zoho_journal_id, response) = match state.zoho.create_journal(&payload).await {
        Ok(result) => result,
        Err(err) => {
            let reason = err.to_string();
            state.ledger.record_post_failure(record.id(), &reason).await?;
            return Err(AppError::BadGateway(reason));
        }
    };

    state
        .ledger
        .approve(
            record.id(),
            ApprovalStamp {
                zoho_expense_id: None,
                zoho_journal_id: zoho_journal_id.clone(),
                zoho_response: Some(response),
            },
        )
        .await?;

    // Reduce the source balance. This is the second write of a two-record
    // transition; a failure here is surfaced on the records rather than
    // rolling back the already-posted journal.
    let cleared = state
        .ledger
        .clear_accrued(
            source_id,
            ClearingInput {
                amount: record.expense.amount,
                paid_through_account_id: record.expense.paid_through_account_id.clone(),
                paid_through_account_name: record.expense.paid_through_account_name.clone(),
                date: record.expense.date,
                reference_number: record.expense.reference_number.clone(),
                source_payment_id: Some(record.id()),
            },
        )
        .await?;
    if cleared.is_none() {
        tracing::warn!(
            payment_id = record.id(),
            source_id = source_id,
            "Source accrued expense was not clearable after the journal was posted"
        );
    }

    if let Some(upstream_id) = zoho_journal_id.as_deref() {
        push_receipts(state, record.id(), AttachmentResource::Journal, upstream_id).await?;
    }

    reload(state, record.id()).await
}

/// Forward receipts collected while pending to the upstream object. Failures
/// are recorded on the record and never fail the approval.
async fn push_receipts(
    state: &AppState,
    record_id: i32,
    resource: AttachmentResource,
    upstream_id: &str,
) -> Result<(), AppError> {
    let Some(record) = state.ledger.get(record_id).await? else {
        return Ok(());
    };
    if record.receipts.is_empty() {
        return Ok(());
    }

    let mut failures = Vec::new();
    for receipt in &record.receipts {
        let bytes = match state.storage.read(record_id, &receipt.filename).await {
            Ok(bytes) => bytes,
            Err(err) => {
                failures.push(format!("{}: {}", receipt.filename, err));
                continue;
            }
        };
        if let Err(err) = state
            .zoho
            .upload_attachment(
                resource,
                upstream_id,
                &receipt.filename,
                bytes,
                content_type_for(&receipt.filename),
            )
            .await
        {
            failures.push(format!("{}: {}", receipt.filename, err));
        }
    }

    let outcome = if failures.is_empty() {
        None
    } else {
        tracing::warn!(
            record_id = record_id,
            failures = failures.len(),
            "Some receipts could not be forwarded upstream"
        );
        Some(failures.join("; "))
    };
    state.ledger.set_attachment_errors(record_id, outcome).await?;
    Ok(())
}

fn expense_payload(expense: &pending_expense::Model) -> ExpensePayload {
    let vendor_id = expense
        .vendor_id
        .clone()
        .filter(|id| !id.trim().is_empty());
    // Zoho expects a vendor id; the free-form name is the fallback
    let vendor_name = if vendor_id.is_none() && !expense.vendor_name.trim().is_empty() {
        Some(expense.vendor_name.clone())
    } else {
        None
    };

    ExpensePayload {
        date: expense.date,
        account_id: expense.expense_account_id.clone(),
        paid_through_account_id: expense.paid_through_account_id.clone(),
        amount: expense.amount,
        reference_number: (!expense.reference_number.is_empty())
            .then(|| expense.reference_number.clone()),
        description: expense.description.clone(),
        vendor_id,
        vendor_name,
    }
}

/// Two balanced lines: debit the accrued liability, credit the cash/bank
/// account the payment was made from.
fn journal_payload(
    payment: &pending_expense::Model,
    liability_account_id: &str,
) -> JournalPayload {
    JournalPayload {
        journal_date: payment.date,
        reference_number: (!payment.reference_number.is_empty())
            .then(|| payment.reference_number.clone()),
        notes: payment.description.clone(),
        line_items: vec![
            JournalLine {
                account_id: liability_account_id.to_string(),
                debit_or_credit: JournalSide::Debit,
                amount: payment.amount,
                description: payment.description.clone(),
            },
            JournalLine {
                account_id: payment.paid_through_account_id.clone(),
                debit_or_credit: JournalSide::Credit,
                amount: payment.amount,
                description: payment.description.clone(),
            },
        ],
    }
}

async fn reload(state: &AppState, id: i32) -> Result<PendingRecord, AppError> {
    state
        .ledger
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("pending record not found".to_string()))
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use ledger::{ExpensePatch, ExpenseType, NewExpense, PendingRecord};
use rust_decimal::Decimal;
use sea_orm::ActiveEnum;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::access::{can_view, filter_visible};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use crate::zoho::VendorContact;

/// Request body for staging a new expense
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateExpenseRequest {
    /// "ordinary" or "accrued" (default: ordinary)
    pub expense_type: Option<String>,
    /// Transaction date (default: today)
    pub date: Option<NaiveDate>,
    /// Amount; must be greater than zero
    pub amount: Decimal,
    /// Upstream vendor id
    pub vendor_id: Option<String>,
    /// Free-form vendor name, used when no vendor id is given
    pub vendor_name: Option<String>,
    /// Reference number shown on the books
    pub reference_number: Option<String>,
    /// Expense account the amount is booked against
    pub expense_account_id: String,
    /// Cash/bank account the expense is paid from. Ignored for accrued
    /// expenses, which always post against the accrued-liability account.
    pub paid_through_account_id: Option<String>,
    pub description: Option<String>,
}

/// Request body for editing a pending expense. Unknown fields are rejected.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateExpenseRequest {
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub vendor_id: Option<String>,
    pub vendor_name: Option<String>,
    pub reference_number: Option<String>,
    pub description: Option<String>,
    pub expense_account_id: Option<String>,
    pub paid_through_account_id: Option<String>,
}

/// A clearing entry on an accrued expense
#[derive(Debug, Serialize, ToSchema)]
pub struct ClearingEntryResponse {
    pub id: i32,
    pub amount: Decimal,
    pub paid_through_account_id: String,
    pub paid_through_account_name: String,
    pub date: NaiveDate,
    pub reference_number: String,
    pub source_payment_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// A receipt attached to an expense
#[derive(Debug, Serialize, ToSchema)]
pub struct ReceiptResponse {
    pub id: i32,
    pub filename: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// A staged expense with its lifecycle and upstream posting state
#[derive(Debug, Serialize, ToSchema)]
pub struct ExpenseResponse {
    pub id: i32,
    pub status: String,
    pub kind: String,
    pub expense_type: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub reference_number: String,
    pub description: String,
    pub vendor_id: Option<String>,
    pub vendor_name: String,
    pub expense_account_id: String,
    pub paid_through_account_id: String,
    pub paid_through_account_name: String,
    pub created_by: String,
    /// Remaining unpaid amount of an accrued expense
    pub balance: Option<Decimal>,
    pub zoho_posted: bool,
    pub zoho_expense_id: Option<String>,
    pub zoho_journal_id: Option<String>,
    pub zoho_error: Option<String>,
    pub zoho_attachment_error: Option<String>,
    pub source_expense_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub cleared_at: Option<DateTime<Utc>>,
    pub clearing: Vec<ClearingEntryResponse>,
    pub receipts: Vec<ReceiptResponse>,
}

impl From<PendingRecord> for ExpenseResponse {
    fn from(record: PendingRecord) -> Self {
        let expense = record.expense;
        Self {
            id: expense.id,
            status: expense.status.to_value(),
            kind: expense.kind.to_value(),
            expense_type: expense.expense_type.to_value(),
            date: expense.date,
            amount: expense.amount,
            reference_number: expense.reference_number,
            description: expense.description,
            vendor_id: expense.vendor_id,
            vendor_name: expense.vendor_name,
            expense_account_id: expense.expense_account_id,
            paid_through_account_id: expense.paid_through_account_id,
            paid_through_account_name: expense.paid_through_account_name,
            created_by: expense.created_by,
            balance: expense.balance,
            zoho_posted: expense.zoho_posted,
            zoho_expense_id: expense.zoho_expense_id,
            zoho_journal_id: expense.zoho_journal_id,
            zoho_error: expense.zoho_error,
            zoho_attachment_error: expense.zoho_attachment_error,
            source_expense_id: expense.source_expense_id,
            created_at: expense.created_at,
            approved_at: expense.approved_at,
            rejected_at: expense.rejected_at,
            cleared_at: expense.cleared_at,
            clearing: record
                .clearing
                .into_iter()
                .map(|entry| ClearingEntryResponse {
                    id: entry.id,
                    amount: entry.amount,
                    paid_through_account_id: entry.paid_through_account_id,
                    paid_through_account_name: entry.paid_through_account_name,
                    date: entry.date,
                    reference_number: entry.reference_number,
                    source_payment_id: entry.source_payment_id,
                    created_at: entry.created_at,
                })
                .collect(),
            receipts: record
                .receipts
                .into_iter()
                .map(|receipt| ReceiptResponse {
                    id: receipt.id,
                    filename: receipt.filename,
                    url: receipt.url,
                    created_at: receipt.created_at,
                })
                .collect(),
        }
    }
}

/// Query parameters for the approved-expenses listing
#[derive(Debug, Deserialize, ToSchema)]
pub struct ApprovedQuery {
    /// Start date, inclusive (YYYY-MM-DD)
    pub start_date: Option<NaiveDate>,
    /// End date, exclusive (YYYY-MM-DD)
    pub end_date: Option<NaiveDate>,
}

/// Stage a new expense for approval
#[utoipa::path(
    post,
    path = "/api/v1/expenses",
    tag = "expenses",
    request_body = CreateExpenseRequest,
    responses(
        (status = 201, description = "Expense staged for approval", body = ApiResponse<ExpenseResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Paid-through account not allowed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(user = %user.user_id))]
pub async fn create_expense(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ExpenseResponse>>), AppError> {
    let expense_type = match request
        .expense_type
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        None | Some("ordinary") => ExpenseType::Ordinary,
        Some("accrued") => ExpenseType::Accrued,
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "unknown expense type '{other}'"
            )));
        }
    };

    if request.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "amount must be greater than zero".to_string(),
        ));
    }
    if request.expense_account_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "expense account is required".to_string(),
        ));
    }

    // Accrued expenses always post against the accrued-liability account;
    // ordinary expenses spend from an account the user is allowed to use
    let (paid_through_account_id, paid_through_account_name) = match expense_type {
        ExpenseType::Accrued => {
            let account = state.coa.accrued_liability_account().ok_or_else(|| {
                AppError::BadRequest(
                    "accrued liability account not found in chart of accounts".to_string(),
                )
            })?;
            (
                account.account_id.trim().to_string(),
                account.account_name.trim().to_string(),
            )
        }
        ExpenseType::Ordinary => {
            let account_id = request
                .paid_through_account_id
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    AppError::BadRequest("paid-through account is required".to_string())
                })?;
            if !user.may_use_account(account_id) {
                warn!(account_id = %account_id, "Paid-through account not in user's allow-list");
                return Err(AppError::Forbidden(
                    "you are not allowed to use this paid-through account".to_string(),
                ));
            }
            let name = state
                .coa
                .paid_through_account_name(account_id)
                .unwrap_or_default();
            (account_id.to_string(), name)
        }
    };

    let vendor_id = request
        .vendor_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let vendor_name = request
        .vendor_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if vendor_id.is_none() && vendor_name.is_empty() {
        return Err(AppError::BadRequest(
            "select a vendor or enter a vendor name".to_string(),
        ));
    }

    let record = state
        .ledger
        .create(NewExpense {
            expense_type,
            date: request.date.unwrap_or_else(|| Utc::now().date_naive()),
            amount: request.amount,
            vendor_id,
            vendor_name,
            reference_number: request.reference_number.unwrap_or_default(),
            description: request.description.unwrap_or_default(),
            expense_account_id: request.expense_account_id.trim().to_string(),
            paid_through_account_id,
            paid_through_account_name,
            created_by: user.user_id.clone(),
        })
        .await?;

    info!(expense_id = record.id(), "Expense staged for approval");
    let response = ApiResponse {
        data: ExpenseResponse::from(record),
        message: "Expense staged for approval".to_string(),
        success: true,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// List approved expenses, defaulting to the current calendar month
#[utoipa::path(
    get,
    path = "/api/v1/expenses/approved",
    tag = "expenses",
    params(
        ("start_date" = Option<NaiveDate>, Query, description = "Start date, inclusive"),
        ("end_date" = Option<NaiveDate>, Query, description = "End date, exclusive"),
    ),
    responses(
        (status = 200, description = "Approved expenses retrieved", body = ApiResponse<Vec<ExpenseResponse>>)
    )
)]
#[instrument(skip(state), fields(user = %user.user_id))]
pub async fn list_approved(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ApprovedQuery>,
) -> Result<Json<ApiResponse<Vec<ExpenseResponse>>>, AppError> {
    let records = state
        .ledger
        .list_approved(query.start_date, query.end_date, true)
        .await?;
    let visible = filter_visible(records, &user);

    let response = ApiResponse {
        data: visible.into_iter().map(ExpenseResponse::from).collect(),
        message: "Approved expenses retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Vendor names already used on staged expenses
#[utoipa::path(
    get,
    path = "/api/v1/expenses/vendor-names",
    tag = "expenses",
    responses(
        (status = 200, description = "Vendor names retrieved", body = ApiResponse<Vec<String>>)
    )
)]
#[instrument(skip(state))]
pub async fn vendor_names(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let names = state.ledger.vendor_names().await?;
    let response = ApiResponse {
        data: names,
        message: "Vendor names retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Vendors known to the upstream accounting system
#[utoipa::path(
    get,
    path = "/api/v1/expenses/vendors",
    tag = "expenses",
    responses(
        (status = 200, description = "Vendors retrieved", body = ApiResponse<Vec<VendorContact>>),
        (status = 502, description = "Upstream failure", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_vendors(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<VendorContact>>>, AppError> {
    let vendors = state.zoho.list_vendor_contacts().await?;
    let response = ApiResponse {
        data: vendors,
        message: "Vendors retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Get a single expense
#[utoipa::path(
    get,
    path = "/api/v1/expenses/{expense_id}",
    tag = "expenses",
    params(("expense_id" = i32, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense retrieved", body = ApiResponse<ExpenseResponse>),
        (status = 403, description = "Not visible to this user", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state), fields(user = %user.user_id))]
pub async fn get_expense(
    Path(expense_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<ExpenseResponse>>, AppError> {
    let record = state
        .ledger
        .get(expense_id)
        .await?
        .ok_or_else(|| AppError::NotFound("expense not found".to_string()))?;

    if !can_view(&record, &user) {
        return Err(AppError::Forbidden(
            "you are not allowed to view this expense".to_string(),
        ));
    }

    let response = ApiResponse {
        data: ExpenseResponse::from(record),
        message: "Expense retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Edit a pending expense
#[utoipa::path(
    patch,
    path = "/api/v1/expenses/{expense_id}",
    tag = "expenses",
    params(("expense_id" = i32, Path, description = "Expense ID")),
    request_body = UpdateExpenseRequest,
    responses(
        (status = 200, description = "Expense updated", body = ApiResponse<ExpenseResponse>),
        (status = 403, description = "Not editable by this user", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(user = %user.user_id))]
pub async fn update_expense(
    Path(expense_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<UpdateExpenseRequest>,
) -> Result<Json<ApiResponse<ExpenseResponse>>, AppError> {
    if let Some(amount) = request.amount {
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(
                "amount must be greater than zero".to_string(),
            ));
        }
    }

    let mut patch = ExpensePatch {
        date: request.date,
        amount: request.amount,
        vendor_id: request
            .vendor_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string),
        vendor_name: request.vendor_name,
        reference_number: request.reference_number,
        description: request.description,
        expense_account_id: request.expense_account_id,
        paid_through_account_id: None,
        paid_through_account_name: None,
    };

    if let Some(account_id) = request
        .paid_through_account_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        if !user.may_use_account(account_id) {
            return Err(AppError::Forbidden(
                "you are not allowed to use this paid-through account".to_string(),
            ));
        }
        patch.paid_through_account_name = Some(
            state
                .coa
                .paid_through_account_name(account_id)
                .unwrap_or_default(),
        );
        patch.paid_through_account_id = Some(account_id.to_string());
    }

    let updated = state
        .ledger
        .update(expense_id, patch, &user.actor())
        .await?
        .ok_or_else(|| AppError::NotFound("expense not found".to_string()))?;

    info!(expense_id = updated.id(), "Expense updated");
    let response = ApiResponse {
        data: ExpenseResponse::from(updated),
        message: "Expense updated successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Delete a pending expense
#[utoipa::path(
    delete,
    path = "/api/v1/expenses/{expense_id}",
    tag = "expenses",
    params(("expense_id" = i32, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense deleted", body = ApiResponse<String>),
        (status = 403, description = "Not deletable by this user", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state), fields(user = %user.user_id))]
pub async fn delete_expense(
    Path(expense_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<String>>, AppError> {
    let deleted = state.ledger.delete(expense_id, &user.actor()).await?;
    if !deleted {
        return Err(AppError::NotFound("expense not found".to_string()));
    }

    info!(expense_id = expense_id, "Expense deleted");
    let response = ApiResponse {
        data: format!("Expense {expense_id} deleted"),
        message: "Expense deleted successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

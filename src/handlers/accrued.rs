use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveDate, Utc};
use ledger::{ClearingPatch, ExpenseStatus, ExpenseType, NewAccruedPayment};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::access::filter_visible;
use crate::auth::{AdminUser, CurrentUser};
use crate::error::AppError;
use crate::handlers::expenses::{ClearingEntryResponse, ExpenseResponse};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Query parameters for the accrued-expenses listing
#[derive(Debug, Deserialize, ToSchema)]
pub struct AccruedQuery {
    /// Include fully cleared records (default: false)
    pub include_cleared: Option<bool>,
}

/// Query parameters for the payments-made listing
#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentsQuery {
    /// Filter by lifecycle status: "pending", "approved" or "rejected"
    pub status: Option<String>,
}

/// Request body for staging a clearing payment against an accrued expense
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ClearAccruedRequest {
    /// Amount to clear; must be greater than zero
    pub amount: Decimal,
    /// Cash/bank account the payment is made from
    pub paid_through_account_id: String,
    /// Payment date (default: today)
    pub date: Option<NaiveDate>,
    pub reference_number: Option<String>,
    pub description: Option<String>,
}

/// Request body for editing a clearing entry. Unknown fields are rejected.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateClearingRequest {
    pub amount: Option<Decimal>,
    pub paid_through_account_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub reference_number: Option<String>,
}

/// List approved accrued expenses with their remaining balances
#[utoipa::path(
    get,
    path = "/api/v1/accrued/expenses",
    tag = "accrued",
    params(
        ("include_cleared" = Option<bool>, Query, description = "Include fully cleared records"),
    ),
    responses(
        (status = 200, description = "Accrued expenses retrieved", body = ApiResponse<Vec<ExpenseResponse>>)
    )
)]
#[instrument(skip(state), fields(user = %user.user_id))]
pub async fn list_accrued(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<AccruedQuery>,
) -> Result<Json<ApiResponse<Vec<ExpenseResponse>>>, AppError> {
    let records = state
        .ledger
        .list_accrued(query.include_cleared.unwrap_or(false))
        .await?;
    let visible = filter_visible(records, &user);

    let response = ApiResponse {
        data: visible.into_iter().map(ExpenseResponse::from).collect(),
        message: "Accrued expenses retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Stage a clearing payment against an approved accrued expense. The
/// payment goes through the same approval workflow; the source balance is
/// only reduced once the payment is approved and posted as a journal.
#[utoipa::path(
    post,
    path = "/api/v1/accrued/expenses/{expense_id}/clear",
    tag = "accrued",
    params(("expense_id" = i32, Path, description = "Accrued expense ID")),
    request_body = ClearAccruedRequest,
    responses(
        (status = 201, description = "Clearing payment staged", body = ApiResponse<ExpenseResponse>),
        (status = 400, description = "Target is not an approved accrued expense", body = ErrorResponse),
        (status = 404, description = "Accrued expense not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(admin = %user.user_id))]
pub async fn clear_accrued(
    Path(expense_id): Path<i32>,
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Json(request): Json<ClearAccruedRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ExpenseResponse>>), AppError> {
    let source = state
        .ledger
        .get(expense_id)
        .await?
        .ok_or_else(|| AppError::NotFound("accrued expense not found".to_string()))?;

    if source.expense.status != ExpenseStatus::Approved
        || source.expense.expense_type != ExpenseType::Accrued
    {
        return Err(AppError::BadRequest(
            "source must be an approved accrued expense".to_string(),
        ));
    }

    if request.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(
            "amount must be greater than zero".to_string(),
        ));
    }

    let paid_through_account_id = request.paid_through_account_id.trim().to_string();
    if paid_through_account_id.is_empty() {
        return Err(AppError::BadRequest(
            "paid-through account is required".to_string(),
        ));
    }

    // The clearing must come from a real cash/bank account, never from the
    // accrued-liability account itself
    if let Some(liability) = state.coa.accrued_liability_account() {
        if liability.account_id.trim() == paid_through_account_id {
            return Err(AppError::BadRequest(
                "clearing payments must be paid from a cash or bank account".to_string(),
            ));
        }
    }

    let paid_through_account_name = state
        .coa
        .paid_through_account_name(&paid_through_account_id)
        .unwrap_or_default();

    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Clearing payment for accrued expense {expense_id}"));

    let payment = state
        .ledger
        .create_payment(NewAccruedPayment {
            source_expense_id: expense_id,
            date: request.date.unwrap_or_else(|| Utc::now().date_naive()),
            amount: request.amount,
            vendor_id: source.expense.vendor_id.clone(),
            vendor_name: source.expense.vendor_name.clone(),
            reference_number: request.reference_number.unwrap_or_default(),
            description,
            paid_through_account_id,
            paid_through_account_name,
            created_by: user.user_id.clone(),
        })
        .await?;

    info!(
        payment_id = payment.id(),
        source_id = expense_id,
        "Clearing payment staged"
    );
    let response = ApiResponse {
        data: ExpenseResponse::from(payment),
        message: "Clearing payment staged for approval".to_string(),
        success: true,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// List clearing payments made against accrued expenses
#[utoipa::path(
    get,
    path = "/api/v1/accrued/payments",
    tag = "accrued",
    params(
        ("status" = Option<String>, Query, description = "Filter by lifecycle status"),
    ),
    responses(
        (status = 200, description = "Payments retrieved", body = ApiResponse<Vec<ExpenseResponse>>),
        (status = 400, description = "Unknown status filter", body = ErrorResponse)
    )
)]
#[instrument(skip(state), fields(user = %user.user_id))]
pub async fn list_payments(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<PaymentsQuery>,
) -> Result<Json<ApiResponse<Vec<ExpenseResponse>>>, AppError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some("pending") => Some(ExpenseStatus::Pending),
        Some("approved") => Some(ExpenseStatus::Approved),
        Some("rejected") => Some(ExpenseStatus::Rejected),
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "unknown status filter '{other}'"
            )));
        }
    };

    let records = state.ledger.list_payments(status).await?;
    let visible = filter_visible(records, &user);

    let response = ApiResponse {
        data: visible.into_iter().map(ExpenseResponse::from).collect(),
        message: "Payments retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Get a single clearing entry
#[utoipa::path(
    get,
    path = "/api/v1/accrued/expenses/{expense_id}/clearing/{clearing_id}",
    tag = "accrued",
    params(
        ("expense_id" = i32, Path, description = "Accrued expense ID"),
        ("clearing_id" = i32, Path, description = "Clearing entry ID"),
    ),
    responses(
        (status = 200, description = "Clearing entry retrieved", body = ApiResponse<ClearingEntryResponse>),
        (status = 404, description = "Clearing entry not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_clearing(
    Path((expense_id, clearing_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    AdminUser(_user): AdminUser,
) -> Result<Json<ApiResponse<ClearingEntryResponse>>, AppError> {
    let entry = state
        .ledger
        .get_clearing(expense_id, clearing_id)
        .await?
        .ok_or_else(|| AppError::NotFound("clearing entry not found".to_string()))?;

    let response = ApiResponse {
        data: ClearingEntryResponse {
            id: entry.id,
            amount: entry.amount,
            paid_through_account_id: entry.paid_through_account_id,
            paid_through_account_name: entry.paid_through_account_name,
            date: entry.date,
            reference_number: entry.reference_number,
            source_payment_id: entry.source_payment_id,
            created_at: entry.created_at,
        },
        message: "Clearing entry retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Edit a clearing entry; the parent balance is recomputed
#[utoipa::path(
    patch,
    path = "/api/v1/accrued/expenses/{expense_id}/clearing/{clearing_id}",
    tag = "accrued",
    params(
        ("expense_id" = i32, Path, description = "Accrued expense ID"),
        ("clearing_id" = i32, Path, description = "Clearing entry ID"),
    ),
    request_body = UpdateClearingRequest,
    responses(
        (status = 200, description = "Clearing entry updated", body = ApiResponse<ClearingEntryResponse>),
        (status = 404, description = "Clearing entry not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_clearing(
    Path((expense_id, clearing_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    AdminUser(_user): AdminUser,
    Json(request): Json<UpdateClearingRequest>,
) -> Result<Json<ApiResponse<ClearingEntryResponse>>, AppError> {
    let mut patch = ClearingPatch {
        amount: request.amount,
        paid_through_account_id: None,
        paid_through_account_name: None,
        date: request.date,
        reference_number: request.reference_number,
    };
    if let Some(account_id) = request
        .paid_through_account_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        patch.paid_through_account_name = Some(
            state
                .coa
                .paid_through_account_name(account_id)
                .unwrap_or_default(),
        );
        patch.paid_through_account_id = Some(account_id.to_string());
    }

    let entry = state
        .ledger
        .update_clearing(expense_id, clearing_id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("clearing entry not found".to_string()))?;

    info!(clearing_id = entry.id, "Clearing entry updated");
    let response = ApiResponse {
        data: ClearingEntryResponse {
            id: entry.id,
            amount: entry.amount,
            paid_through_account_id: entry.paid_through_account_id,
            paid_through_account_name: entry.paid_through_account_name,
            date: entry.date,
            reference_number: entry.reference_number,
            source_payment_id: entry.source_payment_id,
            created_at: entry.created_at,
        },
        message: "Clearing entry updated successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Delete a clearing entry; the parent balance is recomputed
#[utoipa::path(
    delete,
    path = "/api/v1/accrued/expenses/{expense_id}/clearing/{clearing_id}",
    tag = "accrued",
    params(
        ("expense_id" = i32, Path, description = "Accrued expense ID"),
        ("clearing_id" = i32, Path, description = "Clearing entry ID"),
    ),
    responses(
        (status = 200, description = "Clearing entry deleted", body = ApiResponse<String>),
        (status = 404, description = "Clearing entry not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_clearing(
    Path((expense_id, clearing_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    AdminUser(_user): AdminUser,
) -> Result<Json<ApiResponse<String>>, AppError> {
    let deleted = state.ledger.delete_clearing(expense_id, clearing_id).await?;
    if !deleted {
        return Err(AppError::NotFound("clearing entry not found".to_string()));
    }

    info!(clearing_id = clearing_id, "Clearing entry deleted");
    let response = ApiResponse {
        data: format!("Clearing entry {clearing_id} deleted"),
        message: "Clearing entry deleted successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

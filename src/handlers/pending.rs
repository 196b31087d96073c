use axum::{
    extract::{Path, State},
    response::Json,
};
use tracing::{info, instrument};

use crate::auth::AdminUser;
use crate::error::AppError;
use crate::handlers::expenses::ExpenseResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use crate::workflow;

/// List expenses awaiting a decision
#[utoipa::path(
    get,
    path = "/api/v1/pending/expenses",
    tag = "pending",
    responses(
        (status = 200, description = "Pending expenses retrieved", body = ApiResponse<Vec<ExpenseResponse>>),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_pending(
    State(state): State<AppState>,
    AdminUser(_user): AdminUser,
) -> Result<Json<ApiResponse<Vec<ExpenseResponse>>>, AppError> {
    let records = state.ledger.list_pending().await?;
    let response = ApiResponse {
        data: records.into_iter().map(ExpenseResponse::from).collect(),
        message: "Pending expenses retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Approve a pending expense, posting it to the accounting system first.
/// Approving an already-decided record is an idempotent no-op.
#[utoipa::path(
    post,
    path = "/api/v1/pending/expenses/{expense_id}/approve",
    tag = "pending",
    params(("expense_id" = i32, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense approved", body = ApiResponse<ExpenseResponse>),
        (status = 404, description = "Expense not found", body = ErrorResponse),
        (status = 502, description = "Upstream post failed; record stays pending", body = ErrorResponse)
    )
)]
#[instrument(skip(state), fields(admin = %user.user_id))]
pub async fn approve_pending_expense(
    Path(expense_id): Path<i32>,
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
) -> Result<Json<ApiResponse<ExpenseResponse>>, AppError> {
    let record = workflow::approve(&state, expense_id).await?;

    info!(expense_id = expense_id, "Approval completed");
    let response = ApiResponse {
        data: ExpenseResponse::from(record),
        message: "Expense approved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Reject a pending expense. Terminal, no upstream interaction.
#[utoipa::path(
    post,
    path = "/api/v1/pending/expenses/{expense_id}/reject",
    tag = "pending",
    params(("expense_id" = i32, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense rejected", body = ApiResponse<String>),
        (status = 400, description = "Record is not pending", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state), fields(admin = %user.user_id))]
pub async fn reject_pending_expense(
    Path(expense_id): Path<i32>,
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
) -> Result<Json<ApiResponse<String>>, AppError> {
    workflow::reject(&state, expense_id).await?;

    info!(expense_id = expense_id, "Expense rejected");
    let response = ApiResponse {
        data: format!("Expense {expense_id} rejected"),
        message: "Expense rejected successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

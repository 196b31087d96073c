use axum::{extract::State, response::Json};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::coa::CoaAccount;
use crate::error::AppError;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// A chart-of-accounts entry offered in the form dropdowns
#[derive(Debug, Serialize, ToSchema)]
pub struct AccountOption {
    pub account_id: String,
    pub account_name: String,
    pub account_code: String,
    pub account_type: String,
}

impl From<&CoaAccount> for AccountOption {
    fn from(row: &CoaAccount) -> Self {
        Self {
            account_id: row.account_id.trim().to_string(),
            account_name: row.account_name.trim().to_string(),
            account_code: row.account_code.trim().to_string(),
            account_type: row.account_type.trim().to_string(),
        }
    }
}

/// Accounts an expense can be booked against
#[utoipa::path(
    get,
    path = "/api/v1/coa/expense-accounts",
    tag = "coa",
    responses(
        (status = 200, description = "Expense accounts retrieved", body = ApiResponse<Vec<AccountOption>>)
    )
)]
#[instrument(skip(state))]
pub async fn expense_accounts(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<AccountOption>>>, AppError> {
    let response = ApiResponse {
        data: state
            .coa
            .expense_accounts()
            .into_iter()
            .map(AccountOption::from)
            .collect(),
        message: "Expense accounts retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Cash, bank, and credit-card accounts a payment can come from
#[utoipa::path(
    get,
    path = "/api/v1/coa/paid-through-accounts",
    tag = "coa",
    responses(
        (status = 200, description = "Paid-through accounts retrieved", body = ApiResponse<Vec<AccountOption>>)
    )
)]
#[instrument(skip(state))]
pub async fn paid_through_accounts(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<AccountOption>>>, AppError> {
    let response = ApiResponse {
        data: state
            .coa
            .paid_through_accounts()
            .into_iter()
            .map(AccountOption::from)
            .collect(),
        message: "Paid-through accounts retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// The accrued-liability account accrued expenses post against
#[utoipa::path(
    get,
    path = "/api/v1/coa/accrued-account",
    tag = "coa",
    responses(
        (status = 200, description = "Accrued liability account retrieved", body = ApiResponse<AccountOption>),
        (status = 404, description = "Account not configured", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn accrued_account(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<ApiResponse<AccountOption>>, AppError> {
    let account = state.coa.accrued_liability_account().ok_or_else(|| {
        AppError::NotFound("accrued liability account not found in chart of accounts".to_string())
    })?;

    let response = ApiResponse {
        data: AccountOption::from(account),
        message: "Accrued liability account retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

use axum::{
    extract::{Path, State},
    response::Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use crate::zoho::BankAccount;

/// Cash position of one paid-through account: the upstream balance reflects
/// approved activity only, so the locally staged pending total is shown next
/// to it and subtracted for the projection.
#[derive(Debug, Serialize, ToSchema)]
pub struct CashboxResponse {
    pub account_id: String,
    pub account_name: String,
    /// Balance reported by the accounting system
    pub posted_balance: Decimal,
    /// Total of staged, not yet approved expenses against this account
    pub pending_total: Decimal,
    /// posted_balance minus pending_total
    pub projected_balance: Decimal,
}

async fn bank_accounts(state: &AppState) -> Result<Vec<BankAccount>, AppError> {
    state
        .bank_cache
        .try_get_with("bankaccounts".to_string(), async {
            state.zoho.list_bank_accounts().await
        })
        .await
        .map_err(|err| AppError::BadGateway(err.to_string()))
}

async fn cashbox(state: &AppState, account: &BankAccount) -> Result<CashboxResponse, AppError> {
    let posted = Decimal::try_from(account.balance)
        .unwrap_or_default()
        .round_dp(2);
    let pending = state
        .ledger
        .pending_total_for_account(&account.account_id)
        .await?
        .round_dp(2);

    Ok(CashboxResponse {
        account_id: account.account_id.clone(),
        account_name: account.account_name.clone(),
        posted_balance: posted,
        pending_total: pending,
        projected_balance: (posted - pending).round_dp(2),
    })
}

/// Cash dashboard across all visible accounts
#[utoipa::path(
    get,
    path = "/api/v1/cash",
    tag = "cash",
    responses(
        (status = 200, description = "Cash positions retrieved", body = ApiResponse<Vec<CashboxResponse>>),
        (status = 502, description = "Upstream failure", body = ErrorResponse)
    )
)]
#[instrument(skip(state), fields(user = %user.user_id))]
pub async fn get_cash_dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<CashboxResponse>>>, AppError> {
    let accounts = bank_accounts(&state).await?;

    let mut cashboxes = Vec::new();
    for account in &accounts {
        if !user.is_admin && !user.allowed_account_ids.contains(&account.account_id) {
            continue;
        }
        cashboxes.push(cashbox(&state, account).await?);
    }

    let response = ApiResponse {
        data: cashboxes,
        message: "Cash positions retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Cash position of a single account
#[utoipa::path(
    get,
    path = "/api/v1/cash/accounts/{account_id}",
    tag = "cash",
    params(("account_id" = String, Path, description = "Paid-through account ID")),
    responses(
        (status = 200, description = "Cash position retrieved", body = ApiResponse<CashboxResponse>),
        (status = 403, description = "Account not in the user's allow-list", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state), fields(user = %user.user_id))]
pub async fn get_cash_account(
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<CashboxResponse>>, AppError> {
    if !user.may_use_account(&account_id) {
        return Err(AppError::Forbidden(
            "you do not have access to this cash account".to_string(),
        ));
    }

    let accounts = bank_accounts(&state).await?;
    let account = accounts
        .iter()
        .find(|account| account.account_id == account_id)
        .ok_or_else(|| AppError::NotFound("cash account not found".to_string()))?;

    let response = ApiResponse {
        data: cashbox(&state, account).await?,
        message: "Cash position retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

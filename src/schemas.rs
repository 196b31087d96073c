use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::coa::CoaStore;
use crate::storage::ReceiptStorage;
use crate::zoho::{BankAccount, VendorContact, ZohoClient};
use ledger::PendingLedger;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// The pending-expense ledger
    pub ledger: PendingLedger,
    /// Upstream accounting API client
    pub zoho: ZohoClient,
    /// Chart-of-accounts lookups
    pub coa: CoaStore,
    /// Local receipt storage
    pub storage: ReceiptStorage,
    /// Short-lived cache for upstream bank-account lookups
    pub bank_cache: Cache<String, Vec<BankAccount>>,
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
    /// Whether upstream credentials are present
    pub zoho_configured: bool,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::expenses::create_expense,
        crate::handlers::expenses::list_approved,
        crate::handlers::expenses::vendor_names,
        crate::handlers::expenses::list_vendors,
        crate::handlers::expenses::get_expense,
        crate::handlers::expenses::update_expense,
        crate::handlers::expenses::delete_expense,
        crate::handlers::pending::list_pending,
        crate::handlers::pending::approve_pending_expense,
        crate::handlers::pending::reject_pending_expense,
        crate::handlers::accrued::list_accrued,
        crate::handlers::accrued::clear_accrued,
        crate::handlers::accrued::list_payments,
        crate::handlers::accrued::get_clearing,
        crate::handlers::accrued::update_clearing,
        crate::handlers::accrued::delete_clearing,
        crate::handlers::receipts::upload_receipt,
        crate::handlers::cash::get_cash_dashboard,
        crate::handlers::cash::get_cash_account,
        crate::handlers::coa::expense_accounts,
        crate::handlers::coa::paid_through_accounts,
        crate::handlers::coa::accrued_account,
    ),
    components(
        schemas(
            ApiResponse<crate::handlers::expenses::ExpenseResponse>,
            ApiResponse<Vec<crate::handlers::expenses::ExpenseResponse>>,
            ApiResponse<crate::handlers::expenses::ClearingEntryResponse>,
            ApiResponse<Vec<crate::handlers::cash::CashboxResponse>>,
            ApiResponse<crate::handlers::cash::CashboxResponse>,
            ApiResponse<Vec<crate::handlers::coa::AccountOption>>,
            ApiResponse<crate::handlers::coa::AccountOption>,
            ApiResponse<Vec<VendorContact>>,
            ApiResponse<Vec<String>>,
            ApiResponse<String>,
            crate::handlers::expenses::CreateExpenseRequest,
            crate::handlers::expenses::UpdateExpenseRequest,
            crate::handlers::expenses::ExpenseResponse,
            crate::handlers::expenses::ClearingEntryResponse,
            crate::handlers::expenses::ReceiptResponse,
            crate::handlers::accrued::ClearAccruedRequest,
            crate::handlers::accrued::UpdateClearingRequest,
            crate::handlers::cash::CashboxResponse,
            crate::handlers::coa::AccountOption,
            VendorContact,
            ErrorResponse,
            HealthResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "expenses", description = "Expense staging and lookup"),
        (name = "pending", description = "Approval workflow"),
        (name = "accrued", description = "Accrued expenses and clearing payments"),
        (name = "receipts", description = "Receipt attachments"),
        (name = "cash", description = "Cash position dashboard"),
        (name = "coa", description = "Chart-of-accounts lookups"),
    ),
    info(
        title = "Outlay API",
        description = "Expense staging and approval backend in front of Zoho Books",
        version = "0.1.0",
    )
)]
pub struct ApiDoc;

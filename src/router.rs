use crate::handlers::{
    accrued::{clear_accrued, delete_clearing, get_clearing, list_accrued, list_payments, update_clearing},
    cash::{get_cash_account, get_cash_dashboard},
    coa::{accrued_account, expense_accounts, paid_through_accounts},
    expenses::{
        create_expense, delete_expense, get_expense, list_approved, list_vendors, update_expense,
        vendor_names,
    },
    health::health_check,
    pending::{approve_pending_expense, list_pending, reject_pending_expense},
    receipts::upload_receipt,
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
    let uploads_dir = state.storage.uploads_dir().to_path_buf();

    Router::new()
        // Health check and metrics
        .route("/health", get(health_check))
        .route("/metrics", get(move || async move { metric_handle.render() }))
        // Expense staging and lookup
        .route("/api/v1/expenses", post(create_expense))
        .route("/api/v1/expenses/approved", get(list_approved))
        .route("/api/v1/expenses/vendor-names", get(vendor_names))
        .route("/api/v1/expenses/vendors", get(list_vendors))
        .route("/api/v1/expenses/:expense_id", get(get_expense))
        .route("/api/v1/expenses/:expense_id", patch(update_expense))
        .route("/api/v1/expenses/:expense_id", delete(delete_expense))
        // Approval workflow
        .route("/api/v1/pending/expenses", get(list_pending))
        .route(
            "/api/v1/pending/expenses/:expense_id/approve",
            post(approve_pending_expense),
        )
        .route(
            "/api/v1/pending/expenses/:expense_id/reject",
            post(reject_pending_expense),
        )
        // Accrued expenses and clearing payments
        .route("/api/v1/accrued/expenses", get(list_accrued))
        .route("/api/v1/accrued/expenses/:expense_id/clear", post(clear_accrued))
        .route("/api/v1/accrued/payments", get(list_payments))
        .route(
            "/api/v1/accrued/expenses/:expense_id/clearing/:clearing_id",
            get(get_clearing),
        )
        .route(
            "/api/v1/accrued/expenses/:expense_id/clearing/:clearing_id",
            patch(update_clearing),
        )
        .route(
            "/api/v1/accrued/expenses/:expense_id/clearing/:clearing_id",
            delete(delete_clearing),
        )
        // Receipts
        .route("/api/v1/receipts/:expense_id", post(upload_receipt))
        // Cash dashboard
        .route("/api/v1/cash", get(get_cash_dashboard))
        .route("/api/v1/cash/accounts/:account_id", get(get_cash_account))
        // Chart of accounts
        .route("/api/v1/coa/expense-accounts", get(expense_accounts))
        .route("/api/v1/coa/paid-through-accounts", get(paid_through_accounts))
        .route("/api/v1/coa/accrued-account", get(accrued_account))
        // Uploaded receipts
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(prometheus_layer)
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(90)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::{Settings, build_app_state};
use crate::router::create_router;
use crate::schemas::AppState;
use crate::zoho::ZohoConfig;

/// Chart of accounts used by the HTTP-level tests.
pub const COA_CSV: &str = "\
Account Name,Account Code,Account Type,Account SubType,Account ID
Petty Cash,1000,Cash,Cash,cash-100
Main Bank,1010,Bank,Bank,bank-200
Office Supplies,5000,Expense,Expense,exp-500
Freight,5010,Cost of Goods Sold,COGS,exp-510
Accrued Expenses,2100,Other Current Liability,Accrued,liab-900
";

/// A fully wired application over an in-memory database, a temporary
/// uploads directory, and a wiremock stand-in for Zoho Books.
pub struct TestContext {
    pub server: TestServer,
    pub state: AppState,
    pub zoho: MockServer,
    pub workdir: TempDir,
}

pub async fn setup_test_context() -> TestContext {
    let workdir = tempfile::tempdir().expect("Failed to create temp workdir");
    let coa_csv_path = workdir.path().join("Chart_of_Accounts.csv");
    std::fs::write(&coa_csv_path, COA_CSV).expect("Failed to write COA csv");

    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");
    Migrator::up(&db, None).await.expect("Migrations failed");

    let zoho = MockServer::start().await;

    let settings = Settings {
        uploads_dir: workdir.path().join("uploads"),
        coa_csv_path,
        accrued_account_id: None,
        accrued_account_name: "Accrued Expenses".to_string(),
        zoho: ZohoConfig {
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            org_id: "org-1".to_string(),
            books_base_url: zoho.uri(),
            accounts_base_url: zoho.uri(),
        },
    };

    let state = build_app_state(db, &settings).expect("Failed to build app state");
    let server = TestServer::new(create_router(state.clone())).expect("Failed to start test server");

    TestContext {
        server,
        state,
        zoho,
        workdir,
    }
}

/// Attach the gateway identity headers to a test request.
pub trait AuthHeaders {
    fn as_admin(self) -> Self;
    fn as_user(self, user_id: &str, allowed_accounts: &str) -> Self;
}

impl AuthHeaders for axum_test::TestRequest {
    fn as_admin(self) -> Self {
        self.add_header(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_static("admin-1"),
        )
        .add_header(
            HeaderName::from_static("x-user-role"),
            HeaderValue::from_static("admin"),
        )
    }

    fn as_user(self, user_id: &str, allowed_accounts: &str) -> Self {
        let mut request = self.add_header(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_str(user_id).expect("invalid user id header"),
        );
        if !allowed_accounts.is_empty() {
            request = request.add_header(
                HeaderName::from_static("x-allowed-accounts"),
                HeaderValue::from_str(allowed_accounts).expect("invalid accounts header"),
            );
        }
        request
    }
}

/// Mount the OAuth token endpoint. The client caches the token, so a single
/// expected hit doubles as a check that the cache works.
pub async fn mock_zoho_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok-1",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// Mount a successful expense-creation endpoint.
pub async fn mock_expense_create(server: &MockServer, upstream_id: &str, expect: u64) {
    Mock::given(method("POST"))
        .and(path("/expenses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "message": "The expense has been created.",
            "expense": {"expense_id": upstream_id},
        })))
        .expect(expect)
        .mount(server)
        .await;
}

/// Mount a successful journal-creation endpoint.
pub async fn mock_journal_create(server: &MockServer, upstream_id: &str, expect: u64) {
    Mock::given(method("POST"))
        .and(path("/journals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "message": "The journal has been created.",
            "journal": {"journal_id": upstream_id},
        })))
        .expect(expect)
        .mount(server)
        .await;
}

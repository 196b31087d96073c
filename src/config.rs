use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use moka::future::Cache;
use sea_orm::{Database, DatabaseConnection};

use crate::coa::CoaStore;
use crate::schemas::AppState;
use crate::storage::ReceiptStorage;
use crate::zoho::{ZohoClient, ZohoConfig};
use ledger::PendingLedger;

/// Environment-backed service settings.
#[derive(Clone, Debug)]
pub struct Settings {
    pub uploads_dir: PathBuf,
    pub coa_csv_path: PathBuf,
    /// Explicit accrued-liability account id; wins over the name lookup.
    pub accrued_account_id: Option<String>,
    pub accrued_account_name: String,
    pub zoho: ZohoConfig,
}

impl Settings {
    pub fn from_env() -> Self {
        let env = |key: &str, default: &str| {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        Self {
            uploads_dir: PathBuf::from(env("UPLOADS_DIR", "uploads")),
            coa_csv_path: PathBuf::from(env("COA_CSV_PATH", "Chart_of_Accounts.csv")),
            accrued_account_id: std::env::var("ACCRUED_ACCOUNT_ID")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            accrued_account_name: env("ACCRUED_ACCOUNT_NAME", "Accrued Expenses"),
            zoho: ZohoConfig {
                client_id: env("ZOHO_CLIENT_ID", ""),
                client_secret: env("ZOHO_CLIENT_SECRET", ""),
                refresh_token: env("ZOHO_REFRESH_TOKEN", ""),
                org_id: env("ZOHO_ORG_ID", ""),
                books_base_url: env(
                    "ZOHO_BOOKS_BASE_URL",
                    "https://www.zohoapis.com/books/v3",
                ),
                accounts_base_url: env("ZOHO_ACCOUNTS_BASE_URL", "https://accounts.zoho.com"),
            },
        }
    }
}

/// Assemble the shared application state from an open database connection.
pub fn build_app_state(db: DatabaseConnection, settings: &Settings) -> Result<AppState> {
    let coa = CoaStore::load(
        &settings.coa_csv_path,
        settings.accrued_account_id.clone(),
        settings.accrued_account_name.clone(),
    )?;

    let zoho = ZohoClient::new(settings.zoho.clone());
    if !zoho.is_configured() {
        tracing::warn!("Zoho credentials not configured - approvals will fail until they are set");
    }

    // Bank balances change rarely; cache the upstream lookup briefly
    let bank_cache = Cache::builder()
        .max_capacity(8)
        .time_to_live(Duration::from_secs(300))
        .build();

    Ok(AppState {
        ledger: PendingLedger::new(db.clone()),
        db,
        zoho,
        coa,
        storage: ReceiptStorage::new(settings.uploads_dir.clone()),
        bank_cache,
    })
}

/// Initialize application configuration and state
pub async fn initialize_app_state(database_url: &str) -> Result<AppState> {
    // Load configuration
    dotenvy::dotenv().ok();
    let settings = Settings::from_env();

    // Connect to database
    tracing::info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    build_app_state(db, &settings)
}

//! CSV-backed chart-of-accounts store.
//!
//! The chart of accounts is exported from the accounting system as a CSV and
//! mounted next to the service. It backs the form dropdowns and resolves the
//! "Accrued Expenses" liability account the clearing workflow posts against.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

/// One row of the chart-of-accounts export.
#[derive(Debug, Clone, Deserialize)]
pub struct CoaAccount {
    #[serde(rename = "Account ID", default)]
    pub account_id: String,
    #[serde(rename = "Account Name", default)]
    pub account_name: String,
    #[serde(rename = "Account Code", default)]
    pub account_code: String,
    #[serde(rename = "Account Type", default)]
    pub account_type: String,
    #[serde(rename = "Account SubType", default)]
    pub account_sub_type: String,
}

#[derive(Debug, Clone)]
pub struct CoaStore {
    rows: Arc<Vec<CoaAccount>>,
    accrued_account_id: Option<String>,
    accrued_account_name: String,
}

impl CoaStore {
    /// Load the chart of accounts. A missing file yields an empty store so
    /// the service can come up before the export is mounted.
    pub fn load(
        csv_path: &Path,
        accrued_account_id: Option<String>,
        accrued_account_name: String,
    ) -> Result<Self, csv::Error> {
        let rows = if csv_path.exists() {
            let mut reader = csv::Reader::from_path(csv_path)?;
            let mut rows = Vec::new();
            for row in reader.deserialize() {
                rows.push(row?);
            }
            rows
        } else {
            tracing::warn!(path = %csv_path.display(), "Chart-of-accounts CSV not found, starting empty");
            Vec::new()
        };

        Ok(Self {
            rows: Arc::new(rows),
            accrued_account_id,
            accrued_account_name,
        })
    }

    /// Accounts an expense can be booked against.
    pub fn expense_accounts(&self) -> Vec<&CoaAccount> {
        self.rows
            .iter()
            .filter(|row| {
                let account_type = row.account_type.to_lowercase();
                account_type.contains("expense") || account_type.contains("cost of goods sold")
            })
            .collect()
    }

    /// Cash, bank, and credit-card accounts a payment can come from.
    pub fn paid_through_accounts(&self) -> Vec<&CoaAccount> {
        self.rows
            .iter()
            .filter(|row| {
                let account_type = row.account_type.to_lowercase();
                ["bank", "cash", "credit card"]
                    .iter()
                    .any(|kind| account_type.contains(kind))
            })
            .collect()
    }

    /// Resolve the human-readable name of a paid-through account.
    pub fn paid_through_account_name(&self, account_id: &str) -> Option<String> {
        self.paid_through_accounts()
            .into_iter()
            .find(|row| row.account_id.trim() == account_id)
            .map(|row| row.account_name.trim().to_string())
    }

    /// Resolve the "Accrued Expenses" liability account, by configured
    /// account id when given, otherwise by case-insensitive name match.
    pub fn accrued_liability_account(&self) -> Option<&CoaAccount> {
        if let Some(target) = self
            .accrued_account_id
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            if let Some(row) = self.rows.iter().find(|row| row.account_id.trim() == target) {
                return Some(row);
            }
        }

        let target_name = self.accrued_account_name.trim().to_lowercase();
        if target_name.is_empty() {
            return None;
        }
        self.rows
            .iter()
            .find(|row| row.account_name.trim().to_lowercase() == target_name)
    }
}

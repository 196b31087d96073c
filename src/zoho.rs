//! Zoho Books client.
//!
//! Wraps the upstream accounting API behind typed calls: expense and journal
//! creation, attachment upload, and the bank-account/vendor lookups used by
//! the dashboards. Access tokens are cached per client instance behind an
//! async lock and refreshed through the OAuth refresh-token grant shortly
//! before they expire.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

/// How long before the reported expiry a cached token is considered stale.
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ZohoError {
    #[error("request to Zoho failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status or a non-zero Zoho `code` envelope.
    #[error("Zoho returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Zoho credentials are not configured")]
    NotConfigured,
}

#[derive(Debug, Clone)]
pub struct ZohoConfig {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub org_id: String,
    /// Base URL of the Books API, e.g. `https://www.zohoapis.com/books/v3`.
    pub books_base_url: String,
    /// Base URL of the accounts server issuing OAuth tokens.
    pub accounts_base_url: String,
}

impl ZohoConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty()
            && !self.client_secret.is_empty()
            && !self.refresh_token.is_empty()
    }
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Client for the upstream accounting system.
#[derive(Clone, Debug)]
pub struct ZohoClient {
    client: Client,
    config: ZohoConfig,
    token: Arc<Mutex<Option<CachedToken>>>,
}

/// Which upstream object an attachment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentResource {
    Expense,
    Journal,
}

impl AttachmentResource {
    fn path_segment(&self) -> &'static str {
        match self {
            AttachmentResource::Expense => "expenses",
            AttachmentResource::Journal => "journals",
        }
    }
}

/// Payload for creating an expense upstream. Empty optional fields are left
/// out entirely so Zoho does not reject the payload.
#[derive(Debug, Clone, Serialize)]
pub struct ExpensePayload {
    pub date: NaiveDate,
    pub account_id: String,
    pub paid_through_account_id: String,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalSide {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalLine {
    pub account_id: String,
    pub debit_or_credit: JournalSide,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Payload for creating a balanced journal entry upstream.
#[derive(Debug, Clone, Serialize)]
pub struct JournalPayload {
    pub journal_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub line_items: Vec<JournalLine>,
}

/// A cash/bank account as reported by the upstream system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub account_id: String,
    pub account_name: String,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub account_type: String,
}

/// A vendor contact as reported by the upstream system.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct VendorContact {
    pub contact_id: String,
    pub contact_name: String,
}

impl ZohoClient {
    pub fn new(config: ZohoConfig) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            config,
            token: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Return a valid access token, refreshing through the OAuth
    /// refresh-token grant when the cached one is missing or stale.
    async fn access_token(&self) -> Result<String, ZohoError> {
        if !self.is_configured() {
            return Err(ZohoError::NotConfigured);
        }

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let url = format!(
            "{}/oauth/v2/token",
            self.config.accounts_base_url.trim_end_matches('/')
        );
        let params = [
            ("refresh_token", self.config.refresh_token.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self.client.post(&url).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ZohoError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: serde_json::Value =
            serde_json::from_str(&body).map_err(|_| ZohoError::Api {
                status: status.as_u16(),
                body: body.clone(),
            })?;
        let Some(access_token) = payload.get("access_token").and_then(|v| v.as_str()) else {
            return Err(ZohoError::Api {
                status: status.as_u16(),
                body,
            });
        };
        let expires_in = payload
            .get("expires_in")
            .and_then(|v| v.as_u64())
            .unwrap_or(3600);

        let expires_at = Instant::now() + Duration::from_secs(expires_in)
            - TOKEN_EXPIRY_BUFFER.min(Duration::from_secs(expires_in));
        *cached = Some(CachedToken {
            access_token: access_token.to_string(),
            expires_at,
        });

        tracing::debug!("Zoho access token refreshed");
        Ok(access_token.to_string())
    }

    /// Perform an authenticated JSON request against the Books API and
    /// validate both the HTTP status and Zoho's `code` envelope.
    async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, ZohoError> {
        let token = self.access_token().await?;

        let url = format!(
            "{}/{}",
            self.config.books_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Zoho-oauthtoken {token}"))
            .query(&[("organization_id", self.config.org_id.as_str())])
            .query(query);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, path = %path, "Zoho response");

        if !status.is_success() {
            return Err(ZohoError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: serde_json::Value =
            serde_json::from_str(&body).map_err(|_| ZohoError::Api {
                status: status.as_u16(),
                body: body.clone(),
            })?;

        if let Some(code) = payload.get("code").and_then(|v| v.as_i64()) {
            if code != 0 {
                return Err(ZohoError::Api {
                    status: status.as_u16(),
                    body,
                });
            }
        }

        Ok(payload)
    }

    /// Create an expense upstream. Returns the upstream expense id (when the
    /// response carries one) and the raw response for audit storage.
    pub async fn create_expense(
        &self,
        payload: &ExpensePayload,
    ) -> Result<(Option<String>, serde_json::Value), ZohoError> {
        let body = serde_json::to_value(payload).unwrap_or_default();
        let response = self
            .request_json(Method::POST, "/expenses", Some(body), &[])
            .await?;

        let expense_id = response
            .pointer("/expense/expense_id")
            .or_else(|| response.get("expense_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        tracing::info!(
            expense_id = expense_id.as_deref().unwrap_or("<unknown>"),
            "Expense created in Zoho Books"
        );

        Ok((expense_id, response))
    }

    /// Create a journal entry upstream. Returns the upstream journal id and
    /// the raw response.
    pub async fn create_journal(
        &self,
        payload: &JournalPayload,
    ) -> Result<(Option<String>, serde_json::Value), ZohoError> {
        let body = serde_json::to_value(payload).unwrap_or_default();
        let response = self
            .request_json(Method::POST, "/journals", Some(body), &[])
            .await?;

        let journal_id = response
            .pointer("/journal/journal_id")
            .or_else(|| response.get("journal_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        tracing::info!(
            journal_id = journal_id.as_deref().unwrap_or("<unknown>"),
            "Journal created in Zoho Books"
        );

        Ok((journal_id, response))
    }

    /// Push an attachment to an existing upstream expense or journal.
    pub async fn upload_attachment(
        &self,
        resource: AttachmentResource,
        upstream_id: &str,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ZohoError> {
        let token = self.access_token().await?;

        let url = format!(
            "{}/{}/{}/attachment",
            self.config.books_base_url.trim_end_matches('/'),
            resource.path_segment(),
            upstream_id
        );

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new().part("attachment", part);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Zoho-oauthtoken {token}"))
            .query(&[("organization_id", self.config.org_id.as_str())])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZohoError::Api {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(upstream_id = %upstream_id, filename = %filename, "Attachment uploaded to Zoho Books");
        Ok(())
    }

    /// List cash/bank accounts for the cash dashboard.
    pub async fn list_bank_accounts(&self) -> Result<Vec<BankAccount>, ZohoError> {
        let response = self
            .request_json(Method::GET, "/bankaccounts", None, &[])
            .await?;
        let accounts = response
            .get("bankaccounts")
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
        let accounts: Vec<BankAccount> =
            serde_json::from_value(accounts).map_err(|e| ZohoError::Api {
                status: 200,
                body: format!("unexpected bankaccounts payload: {e}"),
            })?;
        Ok(accounts)
    }

    /// List vendor contacts for the expense-form dropdown.
    pub async fn list_vendor_contacts(&self) -> Result<Vec<VendorContact>, ZohoError> {
        let response = self
            .request_json(
                Method::GET,
                "/contacts",
                None,
                &[("contact_type", "vendor")],
            )
            .await?;
        let contacts = response
            .get("contacts")
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
        let contacts: Vec<VendorContact> =
            serde_json::from_value(contacts).map_err(|e| ZohoError::Api {
                status: 200,
                body: format!("unexpected contacts payload: {e}"),
            })?;
        Ok(contacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> ZohoConfig {
        ZohoConfig {
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            org_id: "org-1".to_string(),
            books_base_url: server.uri(),
            accounts_base_url: server.uri(),
        }
    }

    async fn mount_token(server: &MockServer, expect: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok-1",
                "expires_in": 3600,
            })))
            .expect(expect)
            .mount(server)
            .await;
    }

    #[test]
    fn unconfigured_client_is_detected() {
        let config = ZohoConfig {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            org_id: String::new(),
            books_base_url: "https://www.zohoapis.com/books/v3".to_string(),
            accounts_base_url: "https://accounts.zoho.com".to_string(),
        };
        assert!(!ZohoClient::new(config).is_configured());
    }

    #[tokio::test]
    async fn token_is_cached_across_calls() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/expenses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "message": "created",
                "expense": {"expense_id": "zexp-1"},
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = ZohoClient::new(test_config(&server));
        let payload = ExpensePayload {
            date: chrono::NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            account_id: "exp-500".to_string(),
            paid_through_account_id: "cash-100".to_string(),
            amount: Decimal::from(50),
            reference_number: None,
            description: String::new(),
            vendor_id: Some("v-1".to_string()),
            vendor_name: None,
        };

        let (id, _) = client.create_expense(&payload).await.unwrap();
        assert_eq!(id.as_deref(), Some("zexp-1"));

        // Second call reuses the cached token; the token mock expects 1 hit
        let (id, _) = client.create_expense(&payload).await.unwrap();
        assert_eq!(id.as_deref(), Some("zexp-1"));
    }

    #[tokio::test]
    async fn non_zero_code_envelope_is_an_error() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/expenses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 1038,
                "message": "Invalid account",
            })))
            .mount(&server)
            .await;

        let client = ZohoClient::new(test_config(&server));
        let payload = ExpensePayload {
            date: chrono::NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            account_id: "bogus".to_string(),
            paid_through_account_id: "cash-100".to_string(),
            amount: Decimal::from(50),
            reference_number: None,
            description: String::new(),
            vendor_id: None,
            vendor_name: Some("Acme".to_string()),
        };

        let result = client.create_expense(&payload).await;
        assert!(matches!(result, Err(ZohoError::Api { status: 200, .. })));
    }

    #[tokio::test]
    async fn journal_sides_serialize_lowercase() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/journals"))
            .and(body_string_contains("\"debit_or_credit\":\"debit\""))
            .and(body_string_contains("\"debit_or_credit\":\"credit\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "journal": {"journal_id": "zj-1"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ZohoClient::new(test_config(&server));
        let payload = JournalPayload {
            journal_date: chrono::NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            reference_number: None,
            notes: "clearing".to_string(),
            line_items: vec![
                JournalLine {
                    account_id: "liab-900".to_string(),
                    debit_or_credit: JournalSide::Debit,
                    amount: Decimal::from(400),
                    description: String::new(),
                },
                JournalLine {
                    account_id: "bank-200".to_string(),
                    debit_or_credit: JournalSide::Credit,
                    amount: Decimal::from(400),
                    description: String::new(),
                },
            ],
        };

        let (id, _) = client.create_journal(&payload).await.unwrap();
        assert_eq!(id.as_deref(), Some("zj-1"));
    }
}

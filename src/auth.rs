//! Authenticated-user context.
//!
//! Authentication itself happens at the gateway in front of this service;
//! the verified identity arrives as trusted request headers. The extractors
//! here only parse that context and hand it to the ledger and workflow as a
//! parameter, never as global state.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use ledger::Actor;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const ALLOWED_ACCOUNTS_HEADER: &str = "x-allowed-accounts";

/// The caller's identity and capabilities for this request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    pub is_admin: bool,
    /// Paid-through accounts a non-privileged user may see and spend from.
    pub allowed_account_ids: Vec<String>,
}

impl CurrentUser {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id.clone(),
            is_admin: self.is_admin,
        }
    }

    /// Whether this user may spend from the given paid-through account.
    pub fn may_use_account(&self, account_id: &str) -> bool {
        self.is_admin
            || self
                .allowed_account_ids
                .iter()
                .any(|allowed| allowed == account_id)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let Some(user_id) = header(USER_ID_HEADER) else {
            return Err(AppError::Unauthorized(
                "missing authenticated user context".to_string(),
            ));
        };

        let is_admin = header(USER_ROLE_HEADER)
            .map(|role| role.eq_ignore_ascii_case("admin"))
            .unwrap_or(false);

        let allowed_account_ids = header(ALLOWED_ACCOUNTS_HEADER)
            .map(|accounts| {
                accounts
                    .split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(CurrentUser {
            user_id: user_id.to_string(),
            is_admin,
            allowed_account_ids,
        })
    }
}

/// Extractor for admin-only routes; rejects non-privileged callers.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::Forbidden(
                "administrator role required".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

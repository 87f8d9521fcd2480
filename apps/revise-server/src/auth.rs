//! Caller identity
//!
//! Authentication happens upstream; the proxy forwards the verified user id
//! in the `x-user-id` header. Administrative routes (billing webhooks,
//! support tooling) instead present the server's admin token in
//! `x-admin-token`.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Extractor for the authenticated user's id; rejects with 401 when absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id_from_headers(&parts.headers)
            .map(AuthenticatedUser)
            .ok_or(ApiError::Unauthorized)
    }
}

/// Extractor for callers holding the admin token; rejects with 403 otherwise
#[derive(Debug, Clone, Copy)]
pub struct AdminCredential;

#[async_trait]
impl FromRequestParts<AppState> for AdminCredential {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_deref() else {
            warn!("Admin route called but no admin token is configured");
            return Err(ApiError::Forbidden);
        };

        let presented = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if tokens_match(presented.as_bytes(), expected.as_bytes()) {
            Ok(AdminCredential)
        } else {
            warn!("Rejected admin request with missing or wrong token");
            Err(ApiError::Forbidden)
        }
    }
}

/// Length-checked comparison that inspects every byte
fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    presented.len() == expected.len()
        && presented
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Non-empty user id from the request headers
pub fn user_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(USER_ID_HEADER)?.to_str().ok()?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

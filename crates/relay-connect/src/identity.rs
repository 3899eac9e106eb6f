//! Caller identity verification.

use relay_types::{AuthError, BoxFuture, CallerIdentity, IdentityVerifier};
use serde::Deserialize;
use std::collections::HashMap;

/// Verifies user tokens against the platform's auth service
/// (`GET {base}/auth/v1/user`).
#[derive(Clone)]
pub struct RemoteIdentityVerifier {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Deserialize)]
struct UserBody {
    id: Option<String>,
}

impl RemoteIdentityVerifier {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    async fn fetch_user(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .bearer_auth(token)
            .header("apikey", &self.service_key)
            .send()
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        let status = response.status().as_u16();
        match status {
            200..=299 => {}
            401 | 403 => return Err(AuthError::InvalidToken),
            _ => {
                let body = response.text().await.unwrap_or_default();
                return Err(AuthError::Backend(format!("HTTP {status}: {body}")));
            }
        }

        let user: UserBody = response
            .json()
            .await
            .map_err(|e| AuthError::Backend(format!("Malformed user response: {e}")))?;
        match user.id.filter(|id| !id.is_empty()) {
            Some(id) => Ok(CallerIdentity::new(id)),
            None => Err(AuthError::InvalidToken),
        }
    }
}

impl IdentityVerifier for RemoteIdentityVerifier {
    fn verify<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<CallerIdentity, AuthError>> {
        Box::pin(self.fetch_user(token))
    }
}

/// Fixed token table, for local development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityVerifier {
    tokens: HashMap<String, String>,
}

impl StaticIdentityVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn with_token(mut self, token: impl Into<String>, caller_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), caller_id.into());
        self
    }
}

impl IdentityVerifier for StaticIdentityVerifier {
    fn verify<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<CallerIdentity, AuthError>> {
        let result = self
            .tokens
            .get(token)
            .map(CallerIdentity::new)
            .ok_or(AuthError::InvalidToken);
        Box::pin(async move { result })
    }
}

//! OAuth access token cache
//!
//! The CRM issues short-lived access tokens from a long-lived refresh token. One
//! [`TokenCache`] is shared by every call of a run; the mutex is held across the
//! refresh so concurrent callers never refresh twice.

use super::models::TokenResponse;
use crate::config::{CrmConfig, SecretString};
use crate::domain::{ReconcileError, RemoteError, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct TokenState {
    access_token: Option<String>,
    token_expiry: Option<DateTime<Utc>>,
}

impl TokenState {
    fn valid_token(&self, now: DateTime<Utc>, margin: Duration) -> Option<&str> {
        match (&self.access_token, self.token_expiry) {
            (Some(token), Some(expiry)) if expiry - now > margin => Some(token.as_str()),
            _ => None,
        }
    }
}

/// Refresh-token grant against `{accounts_url}/oauth/v2/token`
#[derive(Clone)]
pub struct TokenCache {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    refresh_token: SecretString,
    refresh_margin: Duration,
    default_ttl: Duration,
    state: Arc<Mutex<TokenState>>,
}

impl TokenCache {
    pub fn new(client: Client, config: &CrmConfig) -> Self {
        Self {
            client,
            token_url: format!(
                "{}/oauth/v2/token",
                config.accounts_url.trim_end_matches('/')
            ),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            refresh_margin: Duration::seconds(config.token_refresh_margin_seconds),
            default_ttl: Duration::seconds(config.default_token_ttl_seconds),
            state: Arc::new(Mutex::new(TokenState::default())),
        }
    }

    /// Return a valid access token, refreshing when absent or inside the expiry margin
    pub async fn access_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;

        if let Some(token) = state.valid_token(Utc::now(), self.refresh_margin) {
            return Ok(token.to_string());
        }

        if let Some(expiry) = state.token_expiry {
            tracing::debug!(
                seconds_until_expiry = (expiry - Utc::now()).num_seconds(),
                "Access token expiring soon, refreshing"
            );
        }

        let (token, expiry) = self.request_token().await?;
        state.access_token = Some(token.clone());
        state.token_expiry = Some(expiry);

        tracing::info!(expires_at = %expiry, "Refreshed CRM access token");
        Ok(token)
    }

    /// Drop the cached token so the next call refreshes
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        *state = TokenState::default();
    }

    async fn request_token(&self) -> Result<(String, DateTime<Utc>)> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_ref()),
            ("refresh_token", self.refresh_token.expose_secret().as_ref()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                ReconcileError::Remote(RemoteError::AuthenticationFailed(format!(
                    "Token request failed: {e}"
                )))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ReconcileError::Remote(RemoteError::AuthenticationFailed(
                format!("Token refresh failed with status {status}: {error_text}"),
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            ReconcileError::Remote(RemoteError::AuthenticationFailed(format!(
                "Failed to parse token response: {e}"
            )))
        })?;

        let token = match body.access_token {
            Some(token) if !token.is_empty() => token,
            _ => {
                return Err(ReconcileError::Remote(RemoteError::AuthenticationFailed(
                    format!(
                        "Token response carried no access_token (error: {})",
                        body.error.as_deref().unwrap_or("none")
                    ),
                )))
            }
        };

        let ttl = body
            .expires_in
            .filter(|secs| *secs > 0)
            .map(Duration::seconds)
            .unwrap_or(self.default_ttl);

        Ok((token, Utc::now() + ttl))
    }
}

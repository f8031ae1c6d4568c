//! OAuth 2.0 authorization-code flow against Google's token endpoint.

use crate::config::OAuthConfig;
use crate::error::CalendarError;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Tokens are refreshed when they expire within this many seconds.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Upper bound on a token lifetime reported by the token endpoint.
const MAX_TOKEN_LIFETIME_SECS: i64 = 86_400 * 365;

/// Access token plus the data needed to renew it.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl TokenSet {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > Duration::seconds(REFRESH_MARGIN_SECS)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    pub fn new(http: reqwest::Client, config: OAuthConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Builds the consent-screen URL the operator is redirected to.
    ///
    /// Offline access with a forced consent prompt so Google always hands
    /// back a refresh token.
    pub fn authorization_url(&self, state: &str) -> Result<String, CalendarError> {
        if self.config.client_id.is_empty() {
            return Err(CalendarError::Config("client_id is empty".to_string()));
        }
        let mut url = url::Url::parse(&self.config.auth_uri)
            .map_err(|e| CalendarError::Config(format!("invalid auth_uri: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("include_granted_scopes", "true")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        Ok(url.into())
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, CalendarError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        self.token_request(&params, None).await
    }

    /// Redeems a refresh token. Google usually omits a new refresh token in
    /// the response, in which case the old one is carried over.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, CalendarError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        self.token_request(&params, Some(refresh_token)).await
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        previous_refresh: Option<&str>,
    ) -> Result<TokenSet, CalendarError> {
        if !self.config.is_configured() {
            return Err(CalendarError::Config(
                "Google OAuth client is not configured".to_string(),
            ));
        }

        let response = self
            .http
            .post(&self.config.token_uri)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {}", err.error, desc),
                    None => err.error,
                },
                Err(_) => format!("token endpoint returned {}", status.as_u16()),
            };
            return Err(CalendarError::OAuth(message));
        }

        let token: TokenResponse = response.json().await?;
        let expires_in = token
            .expires_in
            .unwrap_or(3600)
            .clamp(0, MAX_TOKEN_LIFETIME_SECS);
        Ok(TokenSet {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: Utc::now() + Duration::seconds(expires_in),
        })
    }
}

/// Shared, self-refreshing token holder.
///
/// The lock is held across the refresh request so concurrent calls wait for
/// one refresh instead of each issuing their own.
#[derive(Debug, Clone)]
pub struct TokenCache {
    oauth: OAuthClient,
    current: Arc<Mutex<Option<TokenSet>>>,
}

impl TokenCache {
    pub fn new(oauth: OAuthClient) -> Self {
        Self {
            oauth,
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts the cache with a refresh token only; the first call to
    /// [`TokenCache::access_token`] redeems it.
    pub fn with_refresh_token(oauth: OAuthClient, refresh_token: impl Into<String>) -> Self {
        let seeded = TokenSet {
            access_token: String::new(),
            refresh_token: Some(refresh_token.into()),
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        Self {
            oauth,
            current: Arc::new(Mutex::new(Some(seeded))),
        }
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    pub async fn store(&self, tokens: TokenSet) {
        *self.current.lock().await = Some(tokens);
    }

    pub async fn is_authorized(&self) -> bool {
        self.current.lock().await.is_some()
    }

    /// Returns a usable access token, refreshing it first when needed.
    pub async fn access_token(&self) -> Result<String, CalendarError> {
        let mut guard = self.current.lock().await;
        let Some(tokens) = guard.as_ref() else {
            return Err(CalendarError::NotAuthorized);
        };
        if tokens.is_fresh(Utc::now()) {
            return Ok(tokens.access_token.clone());
        }

        let Some(refresh_token) = tokens.refresh_token.clone() else {
            *guard = None;
            return Err(CalendarError::NotAuthorized);
        };
        let renewed = self.oauth.refresh(&refresh_token).await?;
        tracing::debug!(expires_at = %renewed.expires_at, "refreshed calendar access token");
        let access = renewed.access_token.clone();
        *guard = Some(renewed);
        Ok(access)
    }
}

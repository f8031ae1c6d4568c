use serde::{Deserialize, Serialize};
use std::fmt;

pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![CALENDAR_READONLY_SCOPE.to_string()]
}

fn default_api_base() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

/// OAuth 2.0 web-client registration.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
            scopes: default_scopes(),
        }
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl OAuthConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Everything needed to read one Google calendar.
#[derive(Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(flatten)]
    pub oauth: OAuthConfig,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    /// Pre-provisioned refresh token; lets the service read the calendar
    /// without anyone visiting `/authorize` after a restart.
    #[serde(default, skip_serializing)]
    pub refresh_token: Option<String>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            oauth: OAuthConfig::default(),
            api_base: default_api_base(),
            calendar_id: default_calendar_id(),
            refresh_token: None,
        }
    }
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("oauth", &self.oauth)
            .field("api_base", &self.api_base)
            .field("calendar_id", &self.calendar_id)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

//! Outbound calls.

use crate::api::ApiError;
use crate::config::Config;
use crate::AppState;
use axum::extract::{Extension, Json};
use caller_twilio::{OutboundCall, TwilioError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CreateCallRequest {
    pub to: String,
}

/// Outbound call pointed back at this server's answer webhook, with
/// answering-machine detection and the status callback.
pub fn outbound_call(config: &Config, to: &str) -> OutboundCall {
    OutboundCall {
        to: to.to_string(),
        from: config.twilio.from_number.clone(),
        url: config.server.public_link("voice-greeting"),
        machine_detection: true,
        status_callback: Some(config.server.public_link("call-status")),
    }
}

/// Accepts E.164 numbers such as `+15551234567`.
pub fn is_e164(number: &str) -> bool {
    let Some(digits) = number.strip_prefix('+') else {
        return false;
    };
    (8..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Handler for `POST /calls`.
pub async fn create_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateCallRequest>,
) -> Result<Json<Value>, ApiError> {
    let to = payload.to.trim();
    if !is_e164(to) {
        return Err(ApiError::BadRequest(format!(
            "`to` must be an E.164 number, got {to:?}"
        )));
    }
    if !state.config.twilio.is_configured() || state.config.twilio.from_number.is_empty() {
        return Err(ApiError::ServiceUnavailable(
            "Twilio credentials are not configured".to_string(),
        ));
    }

    let call = outbound_call(&state.config, to);
    let call_sid = state.twilio.create_call(&call).await.map_err(|e| {
        tracing::error!(to, error = %e, "outbound call failed");
        match e {
            TwilioError::Api { message, .. } => ApiError::BadGateway(message),
            other => ApiError::BadGateway(other.to_string()),
        }
    })?;

    tracing::info!(call_sid = %call_sid, to, "outbound call placed");
    Ok(Json(json!({ "call_sid": call_sid })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e164_validation() {
        assert!(is_e164("+15551234567"));
        assert!(!is_e164("5551234567"));
        assert!(!is_e164("+1555-123"));
        assert!(!is_e164("+1"));
    }

    #[test]
    fn outbound_call_targets_public_url() {
        let mut config = Config::default();
        config.server.public_url = "https://voice.example.com".to_string();
        config.twilio.from_number = "+18005550000".to_string();
        let call = outbound_call(&config, "+15551234567");
        assert_eq!(call.url, "https://voice.example.com/voice-greeting");
        assert_eq!(
            call.status_callback.as_deref(),
            Some("https://voice.example.com/call-status")
        );
        assert!(call.machine_detection);
        assert_eq!(call.from, "+18005550000");
    }
}

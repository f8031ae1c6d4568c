use crate::error::TwilioError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Maximum recording size accepted for transcription (10 MiB).
const MAX_RECORDING_BYTES: usize = 10 * 1024 * 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

fn default_api_base() -> String {
    DEFAULT_TWILIO_API_BASE.to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default, skip_serializing)]
    pub auth_token: String,
    /// Caller ID used for outbound calls.
    #[serde(default)]
    pub from_number: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Reject webhooks whose `X-Twilio-Signature` does not verify.
    #[serde(default)]
    pub validate_signatures: bool,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            api_base: default_api_base(),
            validate_signatures: false,
        }
    }
}

impl fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .field("api_base", &self.api_base)
            .field("validate_signatures", &self.validate_signatures)
            .finish()
    }
}

impl TwilioConfig {
    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty()
    }
}

/// Parameters for placing an outbound call.
#[derive(Debug, Clone)]
pub struct OutboundCall {
    pub to: String,
    pub from: String,
    /// Webhook Twilio fetches once the call is answered.
    pub url: String,
    pub machine_detection: bool,
    pub status_callback: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Minimal Twilio REST client.
#[derive(Debug, Clone)]
pub struct TwilioClient {
    http: reqwest::Client,
    config: TwilioConfig,
}

impl TwilioClient {
    pub fn new(config: TwilioConfig) -> Result<Self, TwilioError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TwilioConfig {
        &self.config
    }

    /// Places an outbound call and returns its call SID.
    pub async fn create_call(&self, call: &OutboundCall) -> Result<String, TwilioError> {
        if !self.config.is_configured() {
            return Err(TwilioError::Config(
                "Twilio account SID and auth token are required".to_string(),
            ));
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        );

        let mut form: Vec<(&str, &str)> = vec![
            ("To", call.to.as_str()),
            ("From", call.from.as_str()),
            ("Url", call.url.as_str()),
            ("Method", "POST"),
        ];
        if call.machine_detection {
            form.push(("MachineDetection", "Enable"));
        }
        if let Some(callback) = &call.status_callback {
            form.push(("StatusCallback", callback.as_str()));
            form.push(("StatusCallbackMethod", "POST"));
            form.push(("StatusCallbackEvent", "completed"));
        }

        let response = self
            .http
            .post(url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or(body);
            return Err(TwilioError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let resource: CallResource = response
            .json()
            .await
            .map_err(|e| TwilioError::InvalidResponse(e.to_string()))?;

        tracing::info!(call_sid = %resource.sid, to = %call.to, "outbound call created");
        Ok(resource.sid)
    }

    /// Downloads a call recording as WAV.
    ///
    /// Twilio recording URLs have no extension; appending `.wav` selects the
    /// uncompressed rendition.
    pub async fn download_recording(&self, recording_url: &str) -> Result<Vec<u8>, TwilioError> {
        let url = recording_download_url(recording_url);

        let mut request = self.http.get(&url);
        if self.config.is_configured() {
            request = request.basic_auth(&self.config.account_sid, Some(&self.config.auth_token));
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TwilioError::Api {
                status: status.as_u16(),
                message: format!("recording download failed: {url}"),
            });
        }
        if let Some(len) = response.content_length() {
            if len as usize > MAX_RECORDING_BYTES {
                return Err(TwilioError::TooLarge(len as usize));
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_RECORDING_BYTES {
            return Err(TwilioError::TooLarge(bytes.len()));
        }
        Ok(bytes.to_vec())
    }
}

fn recording_download_url(recording_url: &str) -> String {
    let last_segment = recording_url.rsplit('/').next().unwrap_or_default();
    if last_segment.contains('.') {
        recording_url.to_string()
    } else {
        format!("{recording_url}.wav")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_url_gets_wav_extension() {
        assert_eq!(
            recording_download_url("https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE1"),
            "https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE1.wav"
        );
        assert_eq!(
            recording_download_url("https://example.com/Recordings/RE1.mp3"),
            "https://example.com/Recordings/RE1.mp3"
        );
    }

    #[test]
    fn debug_redacts_auth_token() {
        let config = TwilioConfig {
            account_sid: "AC1".into(),
            auth_token: "secret-token".into(),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret-token"));
    }
}

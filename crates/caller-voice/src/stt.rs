use crate::config::SttConfig;
use crate::error::VoiceError;
use serde::Deserialize;
use std::time::Duration;

/// Maximum audio input size for STT (10 MiB). Prevents OOM from oversized payloads.
const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Transcribes recorded caller audio.
///
/// Used when calls run in recording mode; in the default speech mode Twilio
/// transcribes `<Gather>` input itself.
#[derive(Debug, Clone)]
pub struct SttService {
    http: reqwest::Client,
    config: SttConfig,
}

impl SttService {
    pub fn new(config: SttConfig) -> Result<Self, VoiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    pub async fn transcribe(&self, audio_data: &[u8], filename: &str) -> Result<String, VoiceError> {
        if !self.is_enabled() {
            return Err(VoiceError::Config(
                "transcription API key is not configured".to_string(),
            ));
        }
        if audio_data.is_empty() {
            return Err(VoiceError::Stt("audio data is empty".to_string()));
        }
        if audio_data.len() > MAX_STT_INPUT_BYTES {
            return Err(VoiceError::Stt(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                audio_data.len(),
                MAX_STT_INPUT_BYTES
            )));
        }

        let part = reqwest::multipart::Part::bytes(audio_data.to_vec())
            .file_name(filename.to_string())
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.config.model.clone())
            .part("file", part);

        let url = format!(
            "{}/audio/transcriptions",
            self.config.api_base.trim_end_matches('/')
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VoiceError::Stt(format!(
                "transcription failed with {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text.trim().to_string())
    }
}

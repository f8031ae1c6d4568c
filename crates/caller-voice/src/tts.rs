use crate::config::TtsConfig;
use crate::error::VoiceError;
use serde::Serialize;
use std::time::Duration;

/// Maximum text input for a single synthesis request. ElevenLabs rejects
/// longer inputs on most plans.
const MAX_TTS_INPUT_CHARS: usize = 5_000;

/// Upper bound for returned audio (5 MiB), well above a spoken paragraph.
const MAX_TTS_OUTPUT_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// Service for generating speech from text.
#[derive(Debug, Clone)]
pub struct TtsService {
    http: reqwest::Client,
    config: TtsConfig,
}

impl TtsService {
    pub fn new(config: TtsConfig) -> Result<Self, VoiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    /// Returns `false` when no API key is configured; callers then fall
    /// back to Twilio's built-in `<Say>`.
    pub fn is_enabled(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    pub fn config(&self) -> &TtsConfig {
        &self.config
    }

    /// Synthesizes speech from the given text.
    ///
    /// Returns MP3 bytes suitable for Twilio's `<Play>`.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, VoiceError> {
        if !self.is_enabled() {
            return Err(VoiceError::Config(
                "ElevenLabs API key is not configured".to_string(),
            ));
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(VoiceError::Tts("text is empty".to_string()));
        }
        let chars = text.chars().count();
        if chars > MAX_TTS_INPUT_CHARS {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} characters (limit: {} characters)",
                chars, MAX_TTS_INPUT_CHARS
            )));
        }
        if self.config.voice_id.is_empty() {
            return Err(VoiceError::Config("voice_id is empty".to_string()));
        }

        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.voice_id
        );
        let body = SynthesisRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings {
                stability: self.config.stability,
                similarity_boost: self.config.similarity_boost,
            },
        };

        let response = self
            .http
            .post(url)
            .header("xi-api-key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!(
                "ElevenLabs returned {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(VoiceError::Tts("ElevenLabs returned no audio".to_string()));
        }
        if audio.len() > MAX_TTS_OUTPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "audio exceeds maximum size: {} bytes",
                audio.len()
            )));
        }

        tracing::debug!(chars, bytes = audio.len(), "synthesized speech");
        Ok(audio.to_vec())
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io";

fn default_tts_api_base() -> String {
    DEFAULT_ELEVENLABS_API_BASE.to_string()
}

fn default_voice_id() -> String {
    // ElevenLabs stock voice "Rachel".
    "21m00Tcm4TlvDq8ikWAM".to_string()
}

fn default_model_id() -> String {
    "eleven_turbo_v2".to_string()
}

fn default_stability() -> f32 {
    0.5
}

fn default_similarity_boost() -> f32 {
    0.75
}

fn default_tts_timeout_secs() -> u64 {
    15
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_tts_api_base")]
    pub api_base: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_stability")]
    pub stability: f32,
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f32,
    #[serde(default = "default_tts_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            api_base: default_tts_api_base(),
            api_key: String::new(),
            voice_id: default_voice_id(),
            model_id: default_model_id(),
            stability: default_stability(),
            similarity_boost: default_similarity_boost(),
            timeout_secs: default_tts_timeout_secs(),
        }
    }
}

impl fmt::Debug for TtsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtsConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"[REDACTED]")
            .field("voice_id", &self.voice_id)
            .field("model_id", &self.model_id)
            .field("stability", &self.stability)
            .field("similarity_boost", &self.similarity_boost)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl TtsConfig {
    pub fn new(api_key: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            voice_id: voice_id.into(),
            ..Default::default()
        }
    }
}

fn default_stt_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_stt_model() -> String {
    "whisper-1".to_string()
}

fn default_stt_timeout_secs() -> u64 {
    30
}

/// OpenAI-compatible transcription endpoint settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_stt_api_base")]
    pub api_base: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_stt_model")]
    pub model: String,
    #[serde(default = "default_stt_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            api_base: default_stt_api_base(),
            api_key: String::new(),
            model: default_stt_model(),
            timeout_secs: default_stt_timeout_secs(),
        }
    }
}

impl fmt::Debug for SttConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SttConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

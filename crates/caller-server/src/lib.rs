//! Voice-assistant server library logic.

pub mod api;
pub mod api_calls;
pub mod api_oauth;
pub mod api_voice;
pub mod background;
pub mod config;
pub mod middleware;
pub mod orchestrator;
pub mod session;
pub mod state_machine;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use caller_calendar::{CalendarError, SchedulingService};
use caller_llm::{LlmClient, LlmError, PromptBuilder};
use caller_twilio::{Say, TwilioClient, TwilioError};
use caller_voice::{AudioStore, SttService, TtsService, VoiceError};
use config::Config;
use session::SessionStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use thiserror::Error;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("twilio client: {0}")]
    Twilio(#[from] TwilioError),
    #[error("llm client: {0}")]
    Llm(#[from] LlmError),
    #[error("voice services: {0}")]
    Voice(#[from] VoiceError),
    #[error("calendar client: {0}")]
    Calendar(#[from] CalendarError),
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    pub llm: LlmClient,
    pub prompts: PromptBuilder,
    pub tts: TtsService,
    pub stt: SttService,
    pub audio: AudioStore,
    pub twilio: TwilioClient,
    /// `None` when Google credentials are missing or scheduling is off.
    pub scheduling: Option<SchedulingService>,
    /// Outstanding OAuth `state` values and when they were issued.
    pub oauth_states: Arc<Mutex<HashMap<String, Instant>>>,
    /// Pre-synthesized greeting clip shared by all calls.
    pub greeting_clip: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, StartupError> {
        let audio = AudioStore::open(&config.server.audio_dir).await?;
        let scheduling = if config.scheduling.enabled && config.google.oauth.is_configured() {
            Some(SchedulingService::new(
                &config.google,
                config.scheduling.rules.clone(),
            )?)
        } else {
            tracing::info!("calendar scheduling disabled (no Google OAuth client configured)");
            None
        };

        Ok(Self {
            sessions: SessionStore::new(),
            llm: LlmClient::new(config.openai.clone())?,
            prompts: PromptBuilder::new(
                config.conversation.system_prompt.clone(),
                config.conversation.max_history_turns,
            ),
            tts: TtsService::new(config.elevenlabs.clone())?,
            stt: SttService::new(config.transcription.clone())?,
            audio,
            twilio: TwilioClient::new(config.twilio.clone())?,
            scheduling,
            oauth_states: Arc::new(Mutex::new(HashMap::new())),
            greeting_clip: Arc::new(RwLock::new(None)),
            config: Arc::new(config),
        })
    }

    /// `<Say>` with the configured voice and language.
    pub fn say(&self, text: impl Into<String>) -> Say {
        let conversation = &self.config.conversation;
        let say = Say::new(text).language(conversation.language.clone());
        match &conversation.say_voice {
            Some(voice) => say.voice(voice.clone()),
            None => say,
        }
    }

    /// Public URL Twilio fetches a stored clip from.
    pub fn clip_url(&self, file_name: &str) -> String {
        self.config.server.public_link(&format!("audio/{file_name}"))
    }

    pub fn greeting_clip(&self) -> Option<String> {
        self.greeting_clip
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

/// Maximum request body size (1 MiB). Twilio webhooks are a few KiB.
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let webhooks = Router::new()
        .route("/voice-greeting", post(api_voice::voice_greeting_handler))
        .route("/gather", post(api_voice::gather_handler))
        .route(
            "/response",
            post(api_voice::response_handler).get(api_voice::response_handler),
        )
        .route("/call-status", post(api_voice::call_status_handler))
        .layer(axum::middleware::from_fn(
            middleware::twilio_signature_middleware,
        ));

    let operator = Router::new()
        .route("/calls", post(api_calls::create_call_handler))
        .layer(axum::middleware::from_fn(middleware::api_key_middleware));

    let audio_dir = state.audio.dir().to_path_buf();
    tracing::info!(path = %audio_dir.display(), "serving synthesized audio at /audio");

    Router::new()
        .route("/health", get(api::health_handler))
        .route("/authorize", get(api_oauth::authorize_handler))
        .route("/oauth2callback", get(api_oauth::oauth_callback_handler))
        .route("/events", get(api_oauth::events_handler))
        .merge(operator)
        .merge(webhooks)
        .nest_service("/audio", ServeDir::new(audio_dir))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}

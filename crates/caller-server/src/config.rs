//! Server configuration loading from file and environment variables.

use caller_calendar::{GoogleConfig, SlotRules};
use caller_llm::LlmConfig;
use caller_twilio::TwilioConfig;
use caller_voice::{SttConfig, TtsConfig};
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub twilio: TwilioConfig,

    /// Chat-completion settings.
    #[serde(default)]
    pub openai: LlmConfig,

    /// Transcription for recording input mode. Shares `OPENAI_API_KEY`.
    #[serde(default)]
    pub transcription: SttConfig,

    #[serde(default)]
    pub elevenlabs: TtsConfig,

    #[serde(default)]
    pub google: GoogleConfig,

    #[serde(default)]
    pub scheduling: SchedulingConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,
}

/// Network configuration for the HTTP server.
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL. Used for audio links, outbound call
    /// webhooks and signature validation.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Scratch directory for synthesized clips.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,

    /// Shared secret for `POST /calls`, sent as `Authorization: Bearer`.
    /// Outbound dialing is refused while unset.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("public_url", &self.public_url)
            .field("audio_dir", &self.audio_dir)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "caller_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Appointment lookup settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Fall back to Twilio's `FromZip` when the caller never says a ZIP.
    #[serde(default)]
    pub use_caller_id_zip: bool,

    #[serde(flatten)]
    pub rules: SlotRules,
}

/// How caller input is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// `<Gather input="speech">`; Twilio transcribes.
    #[default]
    Speech,
    /// `<Record>` plus our own transcription call.
    Recording,
}

/// Conversation scripting and turn timing.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_voicemail_message")]
    pub voicemail_message: String,
    #[serde(default = "default_reprompt")]
    pub reprompt: String,
    #[serde(default = "default_goodbye")]
    pub goodbye: String,
    #[serde(default = "default_filler")]
    pub filler: String,
    #[serde(default = "default_apology")]
    pub apology: String,

    /// `<Say>` voice for text fallbacks, e.g. `Polly.Joanna`.
    #[serde(default)]
    pub say_voice: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub input_mode: InputMode,
    /// Seconds `<Gather>` waits for speech to start.
    #[serde(default = "default_gather_timeout_secs")]
    pub gather_timeout_secs: u32,

    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
    #[serde(default = "default_max_silent_prompts")]
    pub max_silent_prompts: u32,
    #[serde(default = "default_reply_wait_ms")]
    pub reply_wait_ms: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5000
}

fn default_public_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_audio_dir() -> String {
    "audio".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_system_prompt() -> String {
    "You are a friendly phone receptionist for a home-services company. \
     Keep every answer to one or two short spoken sentences with no lists or markup. \
     Help callers book an appointment: ask for their five-digit ZIP code if you do not \
     have it, and only offer appointment times you have been given. \
     When the caller is done or says goodbye, say a short farewell and append [END_CALL]."
        .to_string()
}

fn default_greeting() -> String {
    "Hi, thanks for calling! How can I help you today?".to_string()
}

fn default_voicemail_message() -> String {
    "Hi, this is a courtesy call about scheduling your appointment. \
     Please call us back at your convenience. Goodbye."
        .to_string()
}

fn default_reprompt() -> String {
    "Sorry, I didn't catch that. Could you say it again?".to_string()
}

fn default_goodbye() -> String {
    "It seems we got disconnected. Please call back any time. Goodbye!".to_string()
}

fn default_filler() -> String {
    "One moment while I check on that.".to_string()
}

fn default_apology() -> String {
    "Sorry, I'm having trouble right now. Could you repeat that?".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_gather_timeout_secs() -> u32 {
    5
}

fn default_max_history_turns() -> usize {
    20
}

fn default_max_silent_prompts() -> u32 {
    2
}

fn default_reply_wait_ms() -> u64 {
    2_500
}

fn default_max_poll_attempts() -> u32 {
    6
}

fn default_lookup_timeout_ms() -> u64 {
    4_000
}

fn default_session_ttl_secs() -> u64 {
    1_800
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            audio_dir: default_audio_dir(),
            api_key: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_caller_id_zip: false,
            rules: SlotRules::default(),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            greeting: default_greeting(),
            voicemail_message: default_voicemail_message(),
            reprompt: default_reprompt(),
            goodbye: default_goodbye(),
            filler: default_filler(),
            apology: default_apology(),
            say_voice: None,
            language: default_language(),
            input_mode: InputMode::default(),
            gather_timeout_secs: default_gather_timeout_secs(),
            max_history_turns: default_max_history_turns(),
            max_silent_prompts: default_max_silent_prompts(),
            reply_wait_ms: default_reply_wait_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            session_ttl_secs: default_session_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl ServerConfig {
    /// Joins `path` onto the public base URL.
    pub fn public_link(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.public_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Secrets are expected in the environment rather than the file:
/// `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_FROM_NUMBER`,
/// `OPENAI_API_KEY`, `ELEVENLABS_API_KEY`, `ELEVENLABS_VOICE_ID`,
/// `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REDIRECT_URI` and
/// `GOOGLE_REFRESH_TOKEN`.
///
/// Server overrides:
/// - `CALLER_HOST` overrides `server.host`
/// - `CALLER_PORT` overrides `server.port`
/// - `CALLER_PUBLIC_URL` overrides `server.public_url`
/// - `CALLER_AUDIO_DIR` overrides `server.audio_dir`
/// - `CALLER_LOG_LEVEL` overrides `logging.level`
/// - `CALLER_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, env: impl Fn(&str) -> Option<String>) {
    let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if let Some(host) = env("CALLER_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = env("CALLER_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(url) = env("CALLER_PUBLIC_URL") {
        config.server.public_url = url;
    }
    if let Some(dir) = env("CALLER_AUDIO_DIR") {
        config.server.audio_dir = dir;
    }
    if let Some(key) = env("CALLER_API_KEY") {
        config.server.api_key = Some(key);
    }
    if let Some(level) = env("CALLER_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = env("CALLER_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    if let Some(sid) = env("TWILIO_ACCOUNT_SID") {
        config.twilio.account_sid = sid;
    }
    if let Some(token) = env("TWILIO_AUTH_TOKEN") {
        config.twilio.auth_token = token;
    }
    if let Some(from) = env("TWILIO_FROM_NUMBER") {
        config.twilio.from_number = from;
    }

    if let Some(key) = env("OPENAI_API_KEY") {
        config.openai.api_key = key.clone();
        config.transcription.api_key = key;
    }

    if let Some(key) = env("ELEVENLABS_API_KEY") {
        config.elevenlabs.api_key = key;
    }
    if let Some(voice) = env("ELEVENLABS_VOICE_ID") {
        config.elevenlabs.voice_id = voice;
    }

    if let Some(id) = env("GOOGLE_CLIENT_ID") {
        config.google.oauth.client_id = id;
    }
    if let Some(secret) = env("GOOGLE_CLIENT_SECRET") {
        config.google.oauth.client_secret = secret;
    }
    if let Some(uri) = env("GOOGLE_REDIRECT_URI") {
        config.google.oauth.redirect_uri = uri;
    }
    if let Some(token) = env("GOOGLE_REFRESH_TOKEN") {
        config.google.refresh_token = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.conversation.max_silent_prompts, 2);
        assert_eq!(config.conversation.input_mode, InputMode::Speech);
        assert!(config.scheduling.enabled);
        assert_eq!(config.scheduling.rules.zip_prefix_digits, 3);
    }

    #[test]
    fn parses_sections_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8080
            public_url = "https://voice.example.com"

            [openai]
            model = "gpt-4o"

            [scheduling]
            use_caller_id_zip = true
            max_slots = 5
            weekdays_only = false

            [conversation]
            input_mode = "recording"
            reply_wait_ms = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.openai.model, "gpt-4o");
        assert!(config.scheduling.use_caller_id_zip);
        assert_eq!(config.scheduling.rules.max_slots, 5);
        assert!(!config.scheduling.rules.weekdays_only);
        assert_eq!(config.scheduling.rules.business_start_hour, 9);
        assert_eq!(config.conversation.input_mode, InputMode::Recording);
        assert_eq!(config.conversation.reply_wait_ms, 1000);
        assert_eq!(config.conversation.max_poll_attempts, 6);
    }

    #[test]
    fn env_overrides_secrets_and_server() {
        let vars: HashMap<&str, &str> = [
            ("CALLER_PORT", "9000"),
            ("CALLER_PUBLIC_URL", "https://abc.ngrok.io"),
            ("CALLER_LOG_JSON", "1"),
            ("TWILIO_ACCOUNT_SID", "AC123"),
            ("TWILIO_AUTH_TOKEN", "tok"),
            ("OPENAI_API_KEY", "sk-1"),
            ("ELEVENLABS_API_KEY", "xi-1"),
            ("GOOGLE_CLIENT_ID", "cid"),
            ("GOOGLE_REFRESH_TOKEN", "1//r"),
            ("CALLER_HOST", "not-an-ip"),
            ("CALLER_API_KEY", "dial-secret"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, default_host());
        assert_eq!(config.server.public_url, "https://abc.ngrok.io");
        assert_eq!(config.server.api_key.as_deref(), Some("dial-secret"));
        assert!(config.logging.json);
        assert_eq!(config.twilio.account_sid, "AC123");
        assert_eq!(config.twilio.auth_token, "tok");
        assert_eq!(config.openai.api_key, "sk-1");
        assert_eq!(config.transcription.api_key, "sk-1");
        assert_eq!(config.elevenlabs.api_key, "xi-1");
        assert_eq!(config.google.oauth.client_id, "cid");
        assert_eq!(config.google.refresh_token.as_deref(), Some("1//r"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let server = ServerConfig {
            api_key: Some("dial-secret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{server:?}");
        assert!(!rendered.contains("dial-secret"), "{rendered}");
        assert!(rendered.contains("[REDACTED]"), "{rendered}");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = load_config(Some("/nonexistent/caller-config.toml")).unwrap();
        assert_eq!(config.conversation.reply_wait_ms, 2_500);
    }

    #[test]
    fn public_link_joins_cleanly() {
        let server = ServerConfig {
            public_url: "https://voice.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            server.public_link("/audio/x.mp3"),
            "https://voice.example.com/audio/x.mp3"
        );
    }
}

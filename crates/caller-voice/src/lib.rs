//! Voice infrastructure for the caller service.
//!
//! Renders assistant replies to audio through the ElevenLabs
//! text-to-speech API, transcribes recorded caller audio through an
//! OpenAI-compatible transcription endpoint, and keeps synthesized clips
//! in a scratch directory from which Twilio fetches them with `<Play>`.
//!
//! Clips are short-lived: the server deletes them when the call that
//! produced them ends.

pub mod config;
pub mod error;
pub mod store;
pub mod stt;
pub mod tts;

pub use config::{SttConfig, TtsConfig, DEFAULT_ELEVENLABS_API_BASE};
pub use error::VoiceError;
pub use store::{AudioStore, StoredClip};
pub use stt::SttService;
pub use tts::TtsService;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("voice HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("audio store error: {0}")]
    Store(#[from] std::io::Error),

    #[error("invalid clip name: {0}")]
    InvalidClipName(String),
}

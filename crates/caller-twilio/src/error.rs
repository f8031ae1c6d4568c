use thiserror::Error;

#[derive(Error, Debug)]
pub enum TwilioError {
    #[error("Twilio HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Twilio API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("recording exceeds maximum size: {0} bytes")]
    TooLarge(usize),

    #[error("unexpected Twilio response: {0}")]
    InvalidResponse(String),
}

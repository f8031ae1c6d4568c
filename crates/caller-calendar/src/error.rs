use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("calendar HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("calendar access has not been authorized")]
    NotAuthorized,

    #[error("Calendar API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected calendar response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

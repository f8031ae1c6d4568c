use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM returned an empty completion")]
    EmptyResponse,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

//! Post-processing of model output.

/// Marker the model appends when the conversation is over.
pub const END_CALL_MARKER: &str = "[END_CALL]";

const FALLBACK_FAREWELL: &str = "Thank you for calling. Goodbye!";

/// A reply ready to be spoken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub ends_call: bool,
}

impl Reply {
    /// Strips every `[END_CALL]` marker and collapses the whitespace it
    /// leaves behind.
    pub fn parse(raw: &str) -> Self {
        let ends_call = raw.contains(END_CALL_MARKER);
        let stripped = raw.replace(END_CALL_MARKER, " ");
        let text = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

        let text = if text.is_empty() && ends_call {
            FALLBACK_FAREWELL.to_string()
        } else {
            text
        };
        Self { text, ends_call }
    }
}

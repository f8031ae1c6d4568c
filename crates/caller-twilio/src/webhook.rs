//! Form bodies Twilio posts to voice webhooks.
//!
//! Twilio sends many more parameters than are modelled here; unknown
//! fields are ignored. Optional fields frequently arrive as empty strings,
//! so accessors normalise those to `None`.

use serde::Deserialize;

/// Parameters of a voice webhook (`/voice-greeting`, `/gather`, `/response`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoiceWebhook {
    pub call_sid: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub call_status: Option<CallStatus>,
    #[serde(default)]
    pub answered_by: Option<String>,
    #[serde(default)]
    pub from_zip: Option<String>,
    #[serde(default)]
    pub speech_result: Option<String>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub recording_url: Option<String>,
    #[serde(default)]
    pub digits: Option<String>,
}

impl VoiceWebhook {
    /// The transcribed speech, trimmed, or `None` if nothing was heard.
    pub fn speech(&self) -> Option<&str> {
        non_empty(self.speech_result.as_deref())
    }

    /// Twilio's transcription confidence in `0.0..=1.0`.
    pub fn confidence(&self) -> Option<f32> {
        non_empty(self.confidence.as_deref()).and_then(|c| c.parse().ok())
    }

    pub fn recording_url(&self) -> Option<&str> {
        non_empty(self.recording_url.as_deref())
    }

    pub fn from_zip(&self) -> Option<&str> {
        non_empty(self.from_zip.as_deref())
    }

    pub fn answered_by(&self) -> Option<AnsweredBy> {
        non_empty(self.answered_by.as_deref()).map(AnsweredBy::parse)
    }
}

/// Parameters of the status callback.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallStatusWebhook {
    pub call_sid: String,
    pub call_status: CallStatus,
    #[serde(default)]
    pub call_duration: Option<String>,
}

/// Lifecycle status reported by Twilio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Queued,
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Busy,
    Failed,
    NoAnswer,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl CallStatus {
    /// Returns `true` once the call can no longer produce webhooks.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Busy | Self::Failed | Self::NoAnswer | Self::Canceled
        )
    }
}

/// Answering machine detection outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnsweredBy {
    Human,
    MachineStart,
    MachineEndBeep,
    MachineEndSilence,
    MachineEndOther,
    Fax,
    Unknown,
}

impl AnsweredBy {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "human" => Self::Human,
            "machine_start" => Self::MachineStart,
            "machine_end_beep" => Self::MachineEndBeep,
            "machine_end_silence" => Self::MachineEndSilence,
            "machine_end_other" => Self::MachineEndOther,
            "fax" => Self::Fax,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` when no person is on the line.
    pub fn is_machine(self) -> bool {
        !matches!(self, Self::Human | Self::Unknown)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

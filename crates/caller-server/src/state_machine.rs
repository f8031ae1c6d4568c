//! Per-call conversation phases.
//!
//! Transitions are pure; handlers feed events in and store the result on
//! the session. Webhooks may arrive late or twice, so every transition is
//! total and events that make no sense in a phase leave it unchanged.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Greeting played, waiting for the first utterance.
    Greeting,
    /// Prompted the caller, waiting for speech.
    Listening,
    /// A reply is being generated.
    Thinking,
    /// A reply is playing inside a `<Gather>`.
    Speaking,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    /// The greeting webhook fired.
    Answered,
    SpeechHeard,
    SilenceHeard,
    ReplyReady,
    ReplyFailed,
    /// The last thing said was a goodbye followed by `<Hangup/>`.
    FarewellQueued,
    HungUp,
}

pub fn next_phase(phase: Phase, event: CallEvent) -> Phase {
    use CallEvent::*;
    use Phase::*;

    match (phase, event) {
        (Ended, _) => Ended,
        (_, HungUp) | (_, FarewellQueued) => Ended,
        (Greeting | Listening | Speaking | Thinking, SpeechHeard) => Thinking,
        (Thinking, ReplyReady) => Speaking,
        (Thinking, ReplyFailed) => Listening,
        (Greeting | Listening | Speaking, SilenceHeard) => Listening,
        (current, _) => current,
    }
}

//! Twilio voice webhooks.
//!
//! These handlers always answer with TwiML; upstream failures turn into
//! spoken apologies rather than HTTP errors Twilio would read out as an
//! application error.

use crate::config::InputMode;
use crate::orchestrator::{self, farewell, listen, speak};
use crate::state_machine::CallEvent;
use crate::AppState;
use axum::{
    extract::{Extension, Form, Query},
    http::StatusCode,
};
use caller_twilio::{CallStatusWebhook, Twiml, Verb, VoiceWebhook};
use caller_types::ZipCode;
use serde::Deserialize;
use std::sync::Arc;

/// Handler for `POST /voice-greeting`, the answer webhook.
pub async fn voice_greeting_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(hook): Form<VoiceWebhook>,
) -> Twiml {
    let call_sid = hook.call_sid.as_str();
    let conversation = &state.config.conversation;

    if let Some(answered_by) = hook.answered_by().filter(|a| a.is_machine()) {
        tracing::info!(call_sid, ?answered_by, "machine answered, leaving voicemail");
        return farewell(Verb::Say(state.say(conversation.voicemail_message.clone())));
    }

    let created = state.sessions.open(call_sid, &hook.from);
    let caller_id_zip = hook.from_zip().and_then(|z| ZipCode::parse(z).ok());
    state.sessions.update(call_sid, |session| {
        session.apply(CallEvent::Answered);
        if session.from_zip.is_none() {
            session.from_zip = caller_id_zip;
        }
    });
    tracing::info!(call_sid, from = %hook.from, created, "call answered");

    let clip = state.greeting_clip();
    listen(
        &state,
        Some(speak(&state, &conversation.greeting, clip.as_deref())),
    )
}

/// Handler for `POST /gather`, where caller input arrives.
pub async fn gather_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(hook): Form<VoiceWebhook>,
) -> Twiml {
    let call_sid = hook.call_sid.as_str();
    if state.sessions.open(call_sid, &hook.from) {
        tracing::warn!(call_sid, "input for unknown call, starting a new session");
    }

    let utterance = match state.config.conversation.input_mode {
        InputMode::Speech => hook.speech().map(str::to_string),
        InputMode::Recording => transcribe_recording(&state, &hook).await,
    };

    let Some(utterance) = utterance else {
        return silence(&state, call_sid);
    };
    tracing::info!(
        call_sid,
        confidence = ?hook.confidence(),
        chars = utterance.len(),
        "caller speech"
    );

    match orchestrator::begin_turn(&state, call_sid, &utterance) {
        Some((turn, rx)) => orchestrator::respond_to_turn(&state, call_sid, turn, rx, 0).await,
        None => listen(&state, None),
    }
}

fn silence(state: &AppState, call_sid: &str) -> Twiml {
    let conversation = &state.config.conversation;
    let give_up = state.sessions.update(call_sid, |session| {
        session.silent_prompts += 1;
        if session.silent_prompts >= conversation.max_silent_prompts {
            session.apply(CallEvent::FarewellQueued);
            true
        } else {
            session.apply(CallEvent::SilenceHeard);
            false
        }
    });

    if give_up.unwrap_or(true) {
        tracing::info!(call_sid, "no speech after repeated prompts, hanging up");
        return farewell(Verb::Say(state.say(conversation.goodbye.clone())));
    }
    tracing::debug!(call_sid, "no speech heard, prompting again");
    listen(state, Some(Verb::Say(state.say(conversation.reprompt.clone()))))
}

async fn transcribe_recording(state: &AppState, hook: &VoiceWebhook) -> Option<String> {
    let url = hook.recording_url()?;
    let audio = match state.twilio.download_recording(url).await {
        Ok(audio) => audio,
        Err(e) => {
            tracing::warn!(call_sid = %hook.call_sid, error = %e, "recording download failed");
            return None;
        }
    };
    match state.stt.transcribe(&audio, "recording.wav").await {
        Ok(text) if !text.is_empty() => Some(text),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(call_sid = %hook.call_sid, error = %e, "transcription failed");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResponseQuery {
    pub turn: u64,
    #[serde(default)]
    pub attempt: u32,
}

/// Handler for `GET|POST /response?turn=N&attempt=K`, the redirect target
/// while a reply is still being generated.
pub async fn response_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ResponseQuery>,
    Form(hook): Form<VoiceWebhook>,
) -> Twiml {
    let call_sid = hook.call_sid.as_str();
    let ResponseQuery { turn, attempt } = query;

    let pending = state.sessions.read_with(call_sid, |session| {
        session
            .pending
            .as_ref()
            .filter(|p| p.turn == turn && session.turn == turn)
            .map(|p| p.rx.clone())
    });
    let rx = match pending {
        None => {
            tracing::info!(call_sid, "response poll for unknown call");
            return Twiml::new().hangup();
        }
        Some(None) => {
            tracing::debug!(call_sid, turn, "stale response poll");
            return listen(&state, None);
        }
        Some(Some(rx)) => rx,
    };

    if attempt > state.config.conversation.max_poll_attempts {
        tracing::warn!(call_sid, turn, attempt, "reply took too long, giving up on turn");
        return orchestrator::fail(&state, call_sid, turn);
    }

    orchestrator::respond_to_turn(&state, call_sid, turn, rx, attempt).await
}

/// Handler for `POST /call-status`, Twilio's status callback.
pub async fn call_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(hook): Form<CallStatusWebhook>,
) -> StatusCode {
    tracing::info!(
        call_sid = %hook.call_sid,
        status = ?hook.call_status,
        duration = ?hook.call_duration,
        "call status"
    );
    if hook.call_status.is_terminal() {
        orchestrator::end_call(&state, &hook.call_sid).await;
    }
    StatusCode::NO_CONTENT
}

//! Turn orchestration.
//!
//! Twilio waits about fifteen seconds for a webhook response, while a turn
//! can take longer: calendar lookup, completion and synthesis all run in
//! sequence. Each utterance therefore starts a background task that
//! publishes its result on a `watch` channel. Webhook handlers wait a
//! bounded time on that channel and, if the reply is not ready, answer with
//! a filler line plus a `<Redirect>` to `/response`, which waits again.
//!
//! Every utterance bumps the session's turn number. A task whose turn is
//! no longer current is aborted, and anything it produced is dropped.

use crate::config::InputMode;
use crate::session::{PendingTurn, PreparedReply, TurnState};
use crate::state_machine::CallEvent;
use crate::AppState;
use caller_calendar::{zip_from_speech, SchedulingService};
use caller_llm::{LlmError, Reply, SchedulingContext};
use caller_twilio::{Gather, Record, Twiml, Verb};
use caller_types::{AppointmentSlot, ChatMessage, ZipCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Route that receives caller input.
pub const GATHER_PATH: &str = "/gather";

/// What a generation task needs from the session, copied out so the lock
/// is not held while it runs.
#[derive(Debug, Clone)]
struct TurnContext {
    turn: u64,
    history: Vec<ChatMessage>,
    zip: Option<ZipCode>,
    cached_slots: Option<Vec<AppointmentSlot>>,
}

/// Either the stored clip or a `<Say>` of the text.
pub fn speak(state: &AppState, text: &str, clip: Option<&str>) -> Verb {
    match clip {
        Some(file_name) => Verb::Play {
            url: state.clip_url(file_name),
        },
        None => Verb::Say(state.say(text)),
    }
}

/// Plays `prompt` (if any) and waits for the caller.
pub fn listen(state: &AppState, prompt: Option<Verb>) -> Twiml {
    let conversation = &state.config.conversation;
    match conversation.input_mode {
        InputMode::Speech => {
            let mut gather = Gather::speech(GATHER_PATH)
                .timeout(conversation.gather_timeout_secs)
                .language(conversation.language.clone());
            match prompt {
                Some(Verb::Say(say)) => gather = gather.say(say),
                Some(Verb::Play { url }) => gather = gather.play(url),
                Some(Verb::Pause { length }) => gather = gather.pause(length),
                _ => {}
            }
            Twiml::new().gather(gather)
        }
        InputMode::Recording => {
            let twiml = match prompt {
                Some(verb) => Twiml::new().verb(verb),
                None => Twiml::new(),
            };
            // Twilio skips the action URL for an empty recording and falls
            // through to the next verb; the redirect reports it as silence.
            twiml.record(Record::new(GATHER_PATH)).redirect(GATHER_PATH)
        }
    }
}

/// Plays `prompt` and hangs up.
pub fn farewell(prompt: Verb) -> Twiml {
    Twiml::new().verb(prompt).hangup()
}

/// Records the utterance and starts generating a reply.
///
/// Returns the new turn number and a receiver for its result, or `None`
/// when the call is unknown or a newer utterance already superseded this
/// one.
pub fn begin_turn(
    state: &Arc<AppState>,
    call_sid: &str,
    utterance: &str,
) -> Option<(u64, watch::Receiver<TurnState>)> {
    let max_history = state.config.conversation.max_history_turns;
    let use_caller_id_zip = state.config.scheduling.use_caller_id_zip;

    let context = state.sessions.update(call_sid, |session| {
        session.cancel_pending();
        session.silent_prompts = 0;
        session.turn += 1;
        session.apply(CallEvent::SpeechHeard);

        if let Some(zip) = zip_from_speech(utterance) {
            session.caller_zip = Some(zip);
        } else if session.caller_zip.is_none() && use_caller_id_zip {
            session.caller_zip = session.from_zip.clone();
        }
        session.push_message(ChatMessage::user(utterance), max_history);

        TurnContext {
            turn: session.turn,
            history: session.history.clone(),
            zip: session.caller_zip.clone(),
            cached_slots: session
                .caller_zip
                .as_ref()
                .and_then(|zip| session.slots.get(zip).cloned()),
        }
    })?;

    let turn = context.turn;
    let (tx, rx) = watch::channel(TurnState::Pending);
    let task = tokio::spawn(run_turn(state.clone(), call_sid.to_string(), context, tx));
    let abort = task.abort_handle();

    let registered = state.sessions.update(call_sid, |session| {
        if session.turn != turn {
            return false;
        }
        session.pending = Some(PendingTurn {
            turn,
            rx: rx.clone(),
            abort: abort.clone(),
        });
        true
    });
    if registered != Some(true) {
        abort.abort();
        return None;
    }

    tracing::debug!(call_sid, turn, "turn started");
    Some((turn, rx))
}

async fn run_turn(
    state: Arc<AppState>,
    call_sid: String,
    context: TurnContext,
    tx: watch::Sender<TurnState>,
) {
    let turn = context.turn;
    let outcome = match produce_reply(&state, &call_sid, context).await {
        Ok(reply) => TurnState::Ready(reply),
        Err(e) => {
            tracing::warn!(call_sid = %call_sid, turn, error = %e, "reply generation failed");
            TurnState::Failed(e.to_string())
        }
    };

    let current = state.sessions.read_with(&call_sid, |s| s.turn);
    if current != Some(turn) {
        tracing::debug!(call_sid = %call_sid, turn, "discarding reply for superseded turn");
        return;
    }
    let _ = tx.send(outcome);
}

async fn produce_reply(
    state: &AppState,
    call_sid: &str,
    context: TurnContext,
) -> Result<PreparedReply, LlmError> {
    let scheduling = match (&context.zip, &state.scheduling) {
        (Some(zip), Some(service)) => {
            Some(scheduling_context(state, service, call_sid, zip, context.cached_slots).await)
        }
        _ => None,
    };

    let messages = state.prompts.build(&context.history, scheduling.as_ref());
    let raw = state.llm.complete(&messages).await?;
    let reply = Reply::parse(&raw);

    let clip = match synthesize_clip(state, &reply.text).await {
        Some(file_name) => register_clip(state, call_sid, file_name).await,
        None => None,
    };

    Ok(PreparedReply {
        text: reply.text,
        ends_call: reply.ends_call,
        clip,
    })
}

async fn scheduling_context(
    state: &AppState,
    service: &SchedulingService,
    call_sid: &str,
    zip: &ZipCode,
    cached: Option<Vec<AppointmentSlot>>,
) -> SchedulingContext {
    let slots = match cached {
        Some(slots) => slots,
        None => {
            let limit = Duration::from_millis(state.config.conversation.lookup_timeout_ms);
            match tokio::time::timeout(limit, service.slots_near(zip)).await {
                Ok(Ok(slots)) => {
                    tracing::info!(call_sid, zip = %zip, count = slots.len(), "calendar lookup");
                    state.sessions.update(call_sid, |session| {
                        session.slots.insert(zip.clone(), slots.clone());
                    });
                    slots
                }
                Ok(Err(e)) => {
                    tracing::warn!(call_sid, zip = %zip, error = %e, "calendar lookup failed");
                    return SchedulingContext::Unavailable { zip: zip.clone() };
                }
                Err(_) => {
                    tracing::warn!(call_sid, zip = %zip, "calendar lookup timed out");
                    return SchedulingContext::Unavailable { zip: zip.clone() };
                }
            }
        }
    };

    if slots.is_empty() {
        SchedulingContext::NoSlots { zip: zip.clone() }
    } else {
        SchedulingContext::Slots {
            zip: zip.clone(),
            slots,
        }
    }
}

/// Synthesizes `text` into the clip store. Failures fall back to `<Say>`.
pub async fn synthesize_clip(state: &AppState, text: &str) -> Option<String> {
    if !state.tts.is_enabled() {
        return None;
    }
    let audio = match state.tts.synthesize(text).await {
        Ok(audio) => audio,
        Err(e) => {
            tracing::warn!(error = %e, "speech synthesis failed, falling back to <Say>");
            return None;
        }
    };
    match state.audio.save(&audio).await {
        Ok(clip) => Some(clip.file_name),
        Err(e) => {
            tracing::warn!(error = %e, "failed to store synthesized clip");
            None
        }
    }
}

/// Ties a clip to the call so it is deleted when the call ends. If the
/// call is already gone the clip is removed right away.
async fn register_clip(state: &AppState, call_sid: &str, file_name: String) -> Option<String> {
    let owned = state
        .sessions
        .update(call_sid, |session| session.clips.push(file_name.clone()));
    if owned.is_some() {
        return Some(file_name);
    }
    if let Err(e) = state.audio.remove(&file_name).await {
        tracing::warn!(call_sid, error = %e, "failed to remove orphaned clip");
    }
    None
}

/// Waits up to `wait` for the turn to settle.
pub async fn wait_for_turn(mut rx: watch::Receiver<TurnState>, wait: Duration) -> TurnState {
    let settled = tokio::time::timeout(wait, rx.wait_for(|s| *s != TurnState::Pending)).await;
    match settled {
        Ok(Ok(state)) => state.clone(),
        Ok(Err(_)) => TurnState::Failed("generation task ended without a reply".to_string()),
        Err(_) => TurnState::Pending,
    }
}

/// Waits for turn `turn` and renders whatever state it is in.
///
/// `attempt` is 0 when called from `/gather` and the redirect counter when
/// called from `/response`.
pub async fn respond_to_turn(
    state: &AppState,
    call_sid: &str,
    turn: u64,
    rx: watch::Receiver<TurnState>,
    attempt: u32,
) -> Twiml {
    let wait = Duration::from_millis(state.config.conversation.reply_wait_ms);
    match wait_for_turn(rx, wait).await {
        TurnState::Ready(reply) => deliver(state, call_sid, turn, reply),
        TurnState::Failed(_) => fail(state, call_sid, turn),
        TurnState::Pending => {
            let next = format!("/response?turn={turn}&attempt={}", attempt + 1);
            tracing::debug!(call_sid, turn, attempt, "reply not ready, redirecting");
            let twiml = if attempt == 0 {
                Twiml::new().say_with(state.say(state.config.conversation.filler.clone()))
            } else {
                Twiml::new()
            };
            twiml.redirect(next)
        }
    }
}

/// Plays a finished reply and records it in the history.
pub fn deliver(state: &AppState, call_sid: &str, turn: u64, reply: PreparedReply) -> Twiml {
    let max_history = state.config.conversation.max_history_turns;
    let current = state.sessions.update(call_sid, |session| {
        if session.turn != turn {
            return false;
        }
        session.pending = None;
        session.push_message(ChatMessage::assistant(reply.text.clone()), max_history);
        session.apply(CallEvent::ReplyReady);
        if reply.ends_call {
            session.apply(CallEvent::FarewellQueued);
        }
        true
    });

    match current {
        None => Twiml::new().hangup(),
        Some(false) => listen(state, None),
        Some(true) => {
            tracing::info!(call_sid, turn, ends_call = reply.ends_call, "assistant reply");
            let prompt = speak(state, &reply.text, reply.clip.as_deref());
            if reply.ends_call {
                farewell(prompt)
            } else {
                listen(state, Some(prompt))
            }
        }
    }
}

/// Apologises and listens again after a failed or abandoned turn.
pub fn fail(state: &AppState, call_sid: &str, turn: u64) -> Twiml {
    state.sessions.update(call_sid, |session| {
        if session.turn == turn {
            session.cancel_pending();
            session.apply(CallEvent::ReplyFailed);
        }
    });
    let apology = state.say(state.config.conversation.apology.clone());
    listen(state, Some(Verb::Say(apology)))
}

/// Removes the session and deletes its clips.
pub async fn end_call(state: &AppState, call_sid: &str) -> bool {
    let Some(session) = state.sessions.remove(call_sid) else {
        return false;
    };
    for clip in &session.clips {
        if let Err(e) = state.audio.remove(clip).await {
            tracing::warn!(call_sid, clip = %clip, error = %e, "failed to delete clip");
        }
    }
    tracing::info!(
        call_sid,
        turns = session.turn,
        clips = session.clips.len(),
        "call session closed"
    );
    true
}

/// Synthesizes the greeting once so calls can start with audio.
pub async fn warm_greeting(state: &AppState) {
    let Some(file_name) = synthesize_clip(state, &state.config.conversation.greeting).await else {
        return;
    };
    match state.greeting_clip.write() {
        Ok(mut slot) => *slot = Some(file_name),
        Err(poisoned) => *poisoned.into_inner() = Some(file_name),
    }
    tracing::info!("greeting clip ready");
}

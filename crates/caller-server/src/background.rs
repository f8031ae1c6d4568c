//! Background tasks for the voice server.
//!
//! Twilio's status callback normally closes sessions. The sweeper catches
//! the ones whose callback never arrived, and deletes clips no call owns:
//! greetings from earlier runs and replies whose turn was aborted mid-save.

use crate::orchestrator::end_call;
use crate::AppState;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Evicts sessions idle longer than `conversation.session_ttl_secs`.
/// Returns how many were removed.
pub async fn sweep_idle_sessions(state: &AppState) -> usize {
    let ttl = Duration::from_secs(state.config.conversation.session_ttl_secs);
    let expired = state.sessions.expired(ttl);
    let mut removed = 0;
    for call_sid in expired {
        if end_call(state, &call_sid).await {
            removed += 1;
        }
    }
    removed
}

/// How long an unowned clip may sit in the store before it is deleted.
/// Covers the gap between writing a clip and tying it to its call.
pub const ORPHAN_CLIP_GRACE: Duration = Duration::from_secs(300);

/// Deletes clips at least `min_age` old that belong to no live call and
/// are not the current greeting. Returns how many were removed.
pub async fn remove_orphan_clips(state: &AppState, min_age: Duration) -> usize {
    let candidates = match state.audio.clips_older_than(min_age).await {
        Ok(clips) => clips,
        Err(e) => {
            tracing::warn!(error = %e, "failed to list audio clips");
            return 0;
        }
    };
    let owned = state.sessions.owned_clips();
    let greeting = state.greeting_clip();

    let mut removed = 0;
    for clip in candidates {
        if owned.contains(&clip) || greeting.as_deref() == Some(clip.as_str()) {
            continue;
        }
        match state.audio.remove(&clip).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(clip = %clip, error = %e, "failed to remove orphaned clip"),
        }
    }
    removed
}

/// Starts the session sweeper. Runs indefinitely.
pub async fn start_session_sweeper(state: Arc<AppState>) {
    let interval_seconds = state.config.conversation.sweep_interval_secs;
    if interval_seconds == 0 {
        tracing::warn!("session sweeper disabled (interval=0)");
        return;
    }
    let interval = Duration::from_secs(interval_seconds);

    tracing::info!(
        interval_seconds,
        ttl_seconds = state.config.conversation.session_ttl_secs,
        "starting idle session sweeper"
    );

    loop {
        sleep(interval).await;

        let removed = sweep_idle_sessions(&state).await;
        if removed > 0 {
            tracing::info!(count = removed, "evicted idle call sessions");
        }

        let clips = remove_orphan_clips(&state, ORPHAN_CLIP_GRACE).await;
        if clips > 0 {
            tracing::info!(count = clips, "removed orphaned audio clips");
        }
    }
}

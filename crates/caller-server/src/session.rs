//! In-memory per-call sessions.

use crate::state_machine::{next_phase, CallEvent, Phase};
use caller_types::{AppointmentSlot, ChatMessage, ZipCode};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// A reply ready to be spoken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedReply {
    pub text: String,
    pub ends_call: bool,
    /// Synthesized audio in the clip store; `None` means use `<Say>`.
    pub clip: Option<String>,
}

/// Progress of one generation task, published through a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    Pending,
    Ready(PreparedReply),
    Failed(String),
}

/// The in-flight generation for the current turn.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub turn: u64,
    pub rx: watch::Receiver<TurnState>,
    pub abort: AbortHandle,
}

#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_sid: String,
    pub from: String,
    pub phase: Phase,
    pub history: Vec<ChatMessage>,
    /// Incremented on every utterance; replies for older turns are dropped.
    pub turn: u64,
    pub pending: Option<PendingTurn>,
    pub silent_prompts: u32,
    pub caller_zip: Option<ZipCode>,
    /// Twilio's caller-ID location, only used when configured.
    pub from_zip: Option<ZipCode>,
    /// Calendar lookups already done on this call.
    pub slots: HashMap<ZipCode, Vec<AppointmentSlot>>,
    /// Clip files owned by this call.
    pub clips: Vec<String>,
    pub last_activity: Instant,
}

impl CallSession {
    pub fn new(call_sid: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            call_sid: call_sid.into(),
            from: from.into(),
            phase: Phase::Greeting,
            history: Vec::new(),
            turn: 0,
            pending: None,
            silent_prompts: 0,
            caller_zip: None,
            from_zip: None,
            slots: HashMap::new(),
            clips: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn apply(&mut self, event: CallEvent) -> Phase {
        self.phase = next_phase(self.phase, event);
        self.phase
    }

    /// Appends a message, keeping only the most recent `max` entries.
    pub fn push_message(&mut self, message: ChatMessage, max: usize) {
        self.history.push(message);
        let excess = self.history.len().saturating_sub(max.max(1));
        if excess > 0 {
            self.history.drain(..excess);
        }
    }

    /// Aborts any running generation task.
    pub fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort.abort();
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Shared session map.
///
/// Uses `std::sync::RwLock`: every access is a short map operation and the
/// lock is never held across `.await`.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, CallSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CallSession>> {
        self.inner.read().unwrap_or_else(|poisoned| {
            tracing::error!("session store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CallSession>> {
        self.inner.write().unwrap_or_else(|poisoned| {
            tracing::error!("session store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Creates a session unless one exists. Returns `true` when created.
    pub fn open(&self, call_sid: &str, from: &str) -> bool {
        let mut map = self.write();
        if let Some(existing) = map.get_mut(call_sid) {
            existing.touch();
            return false;
        }
        map.insert(call_sid.to_string(), CallSession::new(call_sid, from));
        true
    }

    /// Snapshot of a session.
    pub fn get(&self, call_sid: &str) -> Option<CallSession> {
        self.read().get(call_sid).cloned()
    }

    /// Reads from a session without touching its activity time.
    pub fn read_with<R>(&self, call_sid: &str, f: impl FnOnce(&CallSession) -> R) -> Option<R> {
        self.read().get(call_sid).map(f)
    }

    /// Runs `f` on the session under the write lock and refreshes its
    /// activity time. Returns `None` when there is no such call.
    pub fn update<R>(&self, call_sid: &str, f: impl FnOnce(&mut CallSession) -> R) -> Option<R> {
        let mut map = self.write();
        let session = map.get_mut(call_sid)?;
        session.touch();
        Some(f(session))
    }

    /// Removes a session and aborts its generation task.
    pub fn remove(&self, call_sid: &str) -> Option<CallSession> {
        let mut session = self.write().remove(call_sid)?;
        session.cancel_pending();
        session.apply(CallEvent::HungUp);
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Call SIDs idle for longer than `ttl`.
    pub fn expired(&self, ttl: Duration) -> Vec<String> {
        let now = Instant::now();
        self.read()
            .values()
            .filter(|s| now.duration_since(s.last_activity) > ttl)
            .map(|s| s.call_sid.clone())
            .collect()
    }

    /// Every clip still referenced by a live call.
    pub fn owned_clips(&self) -> HashSet<String> {
        self.read()
            .values()
            .flat_map(|s| s.clips.iter().cloned())
            .collect()
    }

    /// Removes every session idle for longer than `ttl`.
    pub fn evict_expired(&self, ttl: Duration) -> Vec<CallSession> {
        self.expired(ttl)
            .iter()
            .filter_map(|sid| self.remove(sid))
            .collect()
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::transcript::TranscriptStore;

struct SessionInner {
    transcript: TranscriptStore,
    conversation_id: Mutex<Option<i64>>,
    sending: AtomicBool,
}

/// Shared state for one open conversation: the transcript, the active
/// conversation id, and the in-flight-turn flag.
///
/// Clones are cheap handles onto the same state, so the UI layer and the
/// turn task observe each other's updates.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

impl ChatSession {
    /// Creates a session with an empty transcript and no conversation id
    /// (the first turn asks the backend for a new conversation).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                transcript: TranscriptStore::new(),
                conversation_id: Mutex::new(None),
                sending: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a session resuming an existing conversation.
    pub fn with_conversation(id: i64) -> Self {
        let session = Self::new();
        session.set_conversation_id(id);
        session
    }

    pub fn transcript(&self) -> &TranscriptStore {
        &self.inner.transcript
    }

    pub fn conversation_id(&self) -> Option<i64> {
        *self
            .inner
            .conversation_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_conversation_id(&self, id: i64) {
        *self
            .inner
            .conversation_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(id);
    }

    /// True while a turn is in flight; callers should disable resubmission.
    pub fn is_sending(&self) -> bool {
        self.inner.sending.load(Ordering::SeqCst)
    }

    /// Claims the sending flag. Returns `false` when a turn already holds it.
    pub(crate) fn try_begin_send(&self) -> bool {
        !self.inner.sending.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn end_send(&self) {
        self.inner.sending.store(false, Ordering::SeqCst);
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the sending flag on every turn exit path, including panics.
pub(crate) struct SendingGuard {
    session: ChatSession,
}

impl SendingGuard {
    pub fn new(session: ChatSession) -> Self {
        Self { session }
    }
}

impl Drop for SendingGuard {
    fn drop(&mut self) {
        self.session.end_send();
    }
}

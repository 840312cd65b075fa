use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::wire::HistoryEntry;

/// Stable identifier for one transcript message.
///
/// Patches address messages by id, never by position, so concurrent turns or
/// re-renders cannot corrupt other entries.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MessageId(uuid::Uuid);

impl MessageId {
    pub(crate) fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Author of a transcript message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation transcript.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
}

/// Update applied to a message addressed by id.
///
/// `Append` grows the running assistant reply; `Replace` swaps the whole
/// content (used for error text).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessagePatch {
    Append(String),
    Replace(String),
}

/// Ordered, shared message list.
///
/// Clones are cheap handles onto the same transcript. Every mutation is a
/// single assignment under the lock, so observers never see a partial patch.
#[derive(Clone, Default)]
pub struct TranscriptStore {
    inner: Arc<Mutex<Vec<Message>>>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message and returns its freshly generated id.
    pub fn append(&self, role: Role, content: impl Into<String>) -> MessageId {
        let message = Message {
            id: MessageId::new(),
            role,
            content: content.into(),
        };
        let id = message.id;
        self.lock().push(message);
        id
    }

    /// Applies a patch to the message with the given id.
    ///
    /// Returns `false` when no message carries that id.
    pub fn apply(&self, id: MessageId, patch: MessagePatch) -> bool {
        let mut messages = self.lock();
        let Some(message) = messages.iter_mut().find(|message| message.id == id) else {
            return false;
        };
        match patch {
            MessagePatch::Append(text) => message.content.push_str(&text),
            MessagePatch::Replace(text) => message.content = text,
        }
        true
    }

    /// Returns the current content of the message with the given id.
    pub fn content_of(&self, id: MessageId) -> Option<String> {
        self.lock()
            .iter()
            .find(|message| message.id == id)
            .map(|message| message.content.clone())
    }

    /// Returns a copy of the full transcript.
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().clone()
    }

    /// Returns role/content pairs for the request history (no ids).
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock()
            .iter()
            .map(|message| HistoryEntry {
                role: message.role,
                content: message.content.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

use crate::errors::TurnFailure;
use crate::transcript::MessageId;

/// Final state of a finished turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Id of the assistant message filled by this turn.
    pub assistant: MessageId,
    /// Conversation id active when the stream ended.
    pub conversation_id: Option<i64>,
    /// Final content of the assistant message.
    pub content: String,
}

/// Normalized events exposed by `TurnStream`.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnEvent {
    /// First event for every turn.
    Started {
        turn_id: uuid::Uuid,
        assistant: MessageId,
    },
    /// Incremental assistant text appended to the placeholder.
    Delta {
        turn_id: uuid::Uuid,
        seq: u64,
        text: String,
    },
    /// The server assigned (or confirmed) the conversation id.
    ConversationAssigned { turn_id: uuid::Uuid, id: i64 },
    /// A bad payload or server-signaled error replaced the placeholder
    /// content. Non-terminal; the stream keeps draining.
    ErrorDisplayed { turn_id: uuid::Uuid, text: String },
    /// Terminal success event.
    Completed {
        turn_id: uuid::Uuid,
        outcome: TurnOutcome,
    },
    /// Terminal failure event.
    Failed {
        turn_id: uuid::Uuid,
        failure: TurnFailure,
    },
}

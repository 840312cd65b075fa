//! Common imports for typical client usage.
//!
//! This module intentionally exports the most frequently used client/runtime
//! types so examples and application code need fewer import lines.
pub use crate::{
    AbortHandle, ApiConfig, ChatError, ChatSession, ConversationDirectory, Message, MessageId,
    Role, StreamingChatClient, TranscriptStore, TurnEvent, TurnOutcome, TurnStream,
};

//! Streaming chat client for the research-assistant workspace backend.
//!
//! The core is [`StreamingChatClient`]: it owns one chat turn end to end —
//! issue the request, decode the chunked event-stream response
//! incrementally, and patch a shared [`TranscriptStore`] while normalized
//! [`TurnEvent`]s flow to the caller. Conversation metadata CRUD lives in
//! [`ConversationDirectory`].
//!
//! # Streaming usage
//!
//! ```no_run
//! use assist_chat::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ChatError> {
//! let client = StreamingChatClient::http(ApiConfig::from_env())?;
//!
//! let mut turn = client.send_turn("总结一下毫米波阵列的波束赋形方法")?;
//! while let Some(event) = turn.next_event().await {
//!     if let TurnEvent::Delta { text, .. } = event {
//!         print!("{text}");
//!     }
//! }
//!
//! let outcome = turn.finish().await?;
//! println!("\nconversation: {:?}", outcome.conversation_id);
//! # Ok(())
//! # }
//! ```

/// Streaming chat client and turn handles.
pub mod client;
/// API endpoint configuration and env loading.
pub mod config;
/// Conversation metadata CRUD.
pub mod directory;
/// Public error types.
pub mod errors;
/// Common imports for typical usage.
pub mod prelude;
/// Shared per-conversation state.
pub mod session;
/// Normalized public turn events.
pub mod stream;
/// Ordered message transcript with patch-by-id updates.
pub mod transcript;
/// Transport seam over the chat endpoint.
pub mod transport;
/// Wire-level framing and payload interpretation.
pub mod wire;

pub use client::{AbortHandle, StreamingChatClient, TurnOptions, TurnStream};
pub use config::ApiConfig;
pub use directory::{
    ConversationDirectory, ConversationListener, ConversationSummary, MessageRecord,
};
pub use errors::{ChatError, DirectoryError, TransportError, TurnFailure};
pub use session::ChatSession;
pub use stream::{TurnEvent, TurnOutcome};
pub use transcript::{Message, MessageId, MessagePatch, Role, TranscriptStore};
pub use transport::{ByteStream, HttpTransport, StreamTransport};
pub use wire::{ChatTurnRequest, HistoryEntry};

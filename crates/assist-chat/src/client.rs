use std::sync::Arc;

use futures::StreamExt as _;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::directory::ConversationListener;
use crate::errors::{ChatError, TurnFailure, turn_failure_from_transport};
use crate::session::{ChatSession, SendingGuard};
use crate::stream::{TurnEvent, TurnOutcome};
use crate::transcript::{MessageId, MessagePatch, Role};
use crate::transport::{HttpTransport, StreamTransport};
use crate::wire::{ChatTurnRequest, EventAction, LineFramer, interpret_event, request_failed_text};

/// Handle used to request cancellation of an in-flight turn.
///
/// Cancellation is best-effort: the pending read is abandoned, the partial
/// assistant content stays in the transcript, and the turn resolves with
/// `TurnFailure::Cancelled`.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Turn delivery options.
#[derive(Clone, Debug)]
pub struct TurnOptions {
    /// Bounded event buffer size between the turn task and the consumer.
    pub event_buffer_capacity: usize,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            event_buffer_capacity: 128,
        }
    }
}

/// Owns the full lifecycle of a chat turn: issue the request, decode the
/// chunked response into protocol events, and patch the session transcript
/// incrementally.
///
/// One turn may be in flight per session; re-entrant sends are rejected
/// without touching the transcript.
pub struct StreamingChatClient {
    transport: Arc<dyn StreamTransport>,
    listener: Option<Arc<dyn ConversationListener>>,
    session: ChatSession,
    options: TurnOptions,
}

impl StreamingChatClient {
    /// Creates a client with a fresh session over the given transport.
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        Self {
            transport,
            listener: None,
            session: ChatSession::new(),
            options: TurnOptions::default(),
        }
    }

    /// Creates a client over the HTTP transport for the given backend.
    pub fn http(config: ApiConfig) -> Result<Self, ChatError> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
    }

    /// Replaces the session (for resuming an existing conversation).
    pub fn with_session(mut self, session: ChatSession) -> Self {
        self.session = session;
        self
    }

    /// Registers the directory listener notified when the server assigns a
    /// conversation id.
    pub fn with_listener(mut self, listener: Arc<dyn ConversationListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_options(mut self, options: TurnOptions) -> Self {
        self.options = options;
        self
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Starts one chat turn.
    ///
    /// Appends the user message and an empty assistant placeholder, then
    /// spawns the turn task; the transcript is patched asynchronously while
    /// the returned `TurnStream` reports normalized events. Must be called
    /// within a tokio runtime.
    pub fn send_turn(&self, prompt: impl Into<String>) -> Result<TurnStream, ChatError> {
        let prompt = prompt.into();
        let message = prompt.trim();
        if message.is_empty() {
            return Err(ChatError::Validation("prompt must not be empty".into()));
        }
        if self.options.event_buffer_capacity == 0 {
            return Err(ChatError::Validation(
                "event_buffer_capacity must be greater than 0".into(),
            ));
        }
        if !self.session.try_begin_send() {
            return Err(ChatError::TurnInFlight);
        }
        let guard = SendingGuard::new(self.session.clone());

        let transcript = self.session.transcript().clone();
        // History carries only the turns before this one; the backend appends
        // the new message itself.
        let request = ChatTurnRequest {
            message: message.to_string(),
            conversation_id: self.session.conversation_id(),
            history: transcript.history(),
        };
        transcript.append(Role::User, message);
        let assistant = transcript.append(Role::Assistant, "");

        let turn_id = uuid::Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.options.event_buffer_capacity);
        let (final_tx, final_rx) = oneshot::channel();
        let (abort_tx, abort_rx) = watch::channel(false);
        let abort_handle = AbortHandle { tx: abort_tx };

        tokio::spawn(turn_task(TurnTask {
            transport: self.transport.clone(),
            listener: self.listener.clone(),
            session: self.session.clone(),
            guard,
            request,
            assistant,
            turn_id,
            tx,
            final_tx,
            abort_rx,
        }));

        Ok(TurnStream {
            turn_id,
            assistant,
            rx,
            final_rx,
            abort_handle,
            saw_terminal: false,
        })
    }
}

/// Streaming handle returned by `StreamingChatClient::send_turn`.
///
/// Use `next_event()` to observe events as they arrive and `finish()` to
/// obtain the terminal result. Dropping the handle does not cancel the turn;
/// the transcript keeps receiving patches.
#[derive(Debug)]
pub struct TurnStream {
    turn_id: uuid::Uuid,
    assistant: MessageId,
    rx: mpsc::Receiver<TurnEvent>,
    final_rx: oneshot::Receiver<Result<TurnOutcome, ChatError>>,
    abort_handle: AbortHandle,
    saw_terminal: bool,
}

impl TurnStream {
    pub fn turn_id(&self) -> uuid::Uuid {
        self.turn_id
    }

    /// Id of the assistant placeholder this turn fills.
    pub fn assistant_message(&self) -> MessageId {
        self.assistant
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for and returns the next normalized event.
    ///
    /// Returns `None` after the event channel is closed.
    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        let event = self.rx.recv().await;
        if let Some(TurnEvent::Completed { .. } | TurnEvent::Failed { .. }) = &event {
            self.saw_terminal = true;
        }
        event
    }

    /// Drains the stream (if needed) and returns the terminal turn result.
    pub async fn finish(mut self) -> Result<TurnOutcome, ChatError> {
        while !self.saw_terminal {
            match self.rx.recv().await {
                Some(TurnEvent::Completed { .. } | TurnEvent::Failed { .. }) => {
                    self.saw_terminal = true;
                }
                Some(_) => {}
                None => break,
            }
        }

        match self.final_rx.await {
            Ok(result) => result,
            Err(_) => Err(ChatError::Protocol(
                "turn task ended without a final result".into(),
            )),
        }
    }
}

struct TurnTask {
    transport: Arc<dyn StreamTransport>,
    listener: Option<Arc<dyn ConversationListener>>,
    session: ChatSession,
    guard: SendingGuard,
    request: ChatTurnRequest,
    assistant: MessageId,
    turn_id: uuid::Uuid,
    tx: mpsc::Sender<TurnEvent>,
    final_tx: oneshot::Sender<Result<TurnOutcome, ChatError>>,
    abort_rx: watch::Receiver<bool>,
}

async fn turn_task(task: TurnTask) {
    let TurnTask {
        transport,
        listener,
        session,
        guard,
        request,
        assistant,
        turn_id,
        tx,
        final_tx,
        mut abort_rx,
    } = task;
    // Holds the sending flag until every exit path below has run.
    let _guard = guard;
    let transcript = session.transcript().clone();

    send_event(&tx, TurnEvent::Started { turn_id, assistant }).await;
    debug!(%turn_id, conversation_id = ?request.conversation_id, "starting chat stream");

    let mut stream = match transport.post_stream(&request).await {
        Ok(stream) => stream,
        Err(err) => {
            let failure = turn_failure_from_transport(&err);
            transcript.apply(
                assistant,
                MessagePatch::Replace(request_failed_text(Some(&err.to_string()))),
            );
            send_event(
                &tx,
                TurnEvent::Failed {
                    turn_id,
                    failure: failure.clone(),
                },
            )
            .await;
            let _ = final_tx.send(Err(ChatError::TurnFailed(failure)));
            return;
        }
    };

    let mut framer = LineFramer::default();
    let mut pending: Vec<String> = Vec::new();
    let mut seq = 0_u64;
    let mut abort_open = true;

    loop {
        tokio::select! {
            changed = abort_rx.changed(), if abort_open => {
                match changed {
                    Ok(_) if *abort_rx.borrow() => {
                        debug!(%turn_id, "chat stream aborted");
                        send_event(&tx, TurnEvent::Failed { turn_id, failure: TurnFailure::Cancelled }).await;
                        let _ = final_tx.send(Err(ChatError::TurnFailed(TurnFailure::Cancelled)));
                        return;
                    }
                    Ok(_) => {}
                    Err(_) => abort_open = false,
                }
            }
            next = stream.next() => {
                match next {
                    Some(Ok(chunk)) => {
                        for line in framer.push_chunk(&chunk) {
                            if line.is_empty() {
                                let actions = interpret_event(&pending);
                                pending.clear();
                                for action in actions {
                                    match action {
                                        EventAction::AssignConversation(id) => {
                                            session.set_conversation_id(id);
                                            if let Some(listener) = listener.clone() {
                                                // Best-effort refresh; never blocks the stream.
                                                tokio::spawn(async move {
                                                    if let Err(err) = listener.conversation_changed(id).await {
                                                        warn!(conversation_id = id, error = %err, "conversation refresh failed");
                                                    }
                                                });
                                            }
                                            send_event(&tx, TurnEvent::ConversationAssigned { turn_id, id }).await;
                                        }
                                        EventAction::AppendDelta(text) => {
                                            debug!(%turn_id, seq, "assistant delta");
                                            transcript.apply(assistant, MessagePatch::Append(text.clone()));
                                            send_event(&tx, TurnEvent::Delta { turn_id, seq, text }).await;
                                            seq = seq.saturating_add(1);
                                        }
                                        EventAction::ShowError(text) => {
                                            transcript.apply(assistant, MessagePatch::Replace(text.clone()));
                                            send_event(&tx, TurnEvent::ErrorDisplayed { turn_id, text }).await;
                                        }
                                    }
                                }
                            } else {
                                pending.push(line);
                            }
                        }
                    }
                    Some(Err(err)) => {
                        let failure = turn_failure_from_transport(&err);
                        transcript.apply(
                            assistant,
                            MessagePatch::Replace(request_failed_text(Some(&err.to_string()))),
                        );
                        send_event(&tx, TurnEvent::Failed { turn_id, failure: failure.clone() }).await;
                        let _ = final_tx.send(Err(ChatError::TurnFailed(failure)));
                        return;
                    }
                    None => {
                        // Pending lines with no terminating blank line are an
                        // unterminated event; dropped per the framing contract.
                        let outcome = TurnOutcome {
                            assistant,
                            conversation_id: session.conversation_id(),
                            content: transcript.content_of(assistant).unwrap_or_default(),
                        };
                        send_event(&tx, TurnEvent::Completed { turn_id, outcome: outcome.clone() }).await;
                        let _ = final_tx.send(Ok(outcome));
                        return;
                    }
                }
            }
        }
    }
}

async fn send_event(tx: &mpsc::Sender<TurnEvent>, event: TurnEvent) {
    // A dropped observer must not interrupt transcript delivery.
    let _ = tx.send(event).await;
}

//! Wire-level framing and payload interpretation for the chat stream.
//!
//! The backend frames its response as blank-line-terminated events whose
//! lines carry a `data:` marker; each payload is a JSON object with
//! independently optional `delta`, `error`, `detail`, and `conversation_id`
//! fields. `LineFramer` turns raw chunks into complete lines and
//! `interpret_event` turns one event's lines into transcript actions.

use crate::transcript::Role;

const DATA_MARKER: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

const STREAM_ERROR_PREFIX: &str = "流式错误：";
const REQUEST_FAILED_PREFIX: &str = "请求失败：";
const SERVICE_UNAVAILABLE_TEXT: &str = "服务暂时不可用，请稍后重试";

/// User-facing text shown when an event payload cannot be processed.
pub(crate) fn stream_error_text(message: Option<&str>) -> String {
    match message {
        Some(message) if !message.trim().is_empty() => {
            format!("{STREAM_ERROR_PREFIX}{message}")
        }
        _ => format!("{STREAM_ERROR_PREFIX}{SERVICE_UNAVAILABLE_TEXT}"),
    }
}

/// User-facing text shown when the chat request itself fails.
pub(crate) fn request_failed_text(message: Option<&str>) -> String {
    match message {
        Some(message) if !message.trim().is_empty() => {
            format!("{REQUEST_FAILED_PREFIX}{message}")
        }
        _ => SERVICE_UNAVAILABLE_TEXT.to_string(),
    }
}

/// Request body for one chat turn. Immutable once sent.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ChatTurnRequest {
    pub message: String,
    /// `None` serializes to `null` and asks the backend for a new conversation.
    pub conversation_id: Option<i64>,
    pub history: Vec<HistoryEntry>,
}

/// Prior message sent with the request: role and content only.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// One event's JSON payload. Fields are independently optional.
#[derive(Debug, Default, serde::Deserialize)]
struct EventPayload {
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    conversation_id: Option<i64>,
}

/// Incremental line framer over a growing byte buffer.
///
/// Complete lines are drained as they arrive; bytes after the last newline
/// stay buffered until the next chunk. A stream that ends mid-line leaves
/// the tail unflushed, matching the blank-line framing contract. Multi-byte
/// UTF-8 sequences never split across returned lines because `0x0A` cannot
/// appear inside one.
#[derive(Default)]
pub(crate) struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    /// Feeds one chunk and returns every line completed by it, with the
    /// newline removed and a trailing carriage return stripped.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(idx) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line_bytes: Vec<u8> = self.buf[..idx].to_vec();
            self.buf.drain(..=idx);
            if line_bytes.last() == Some(&b'\r') {
                line_bytes.pop();
            }
            lines.push(String::from_utf8_lossy(&line_bytes).into_owned());
        }
        lines
    }
}

/// Transcript-facing action decoded from one protocol event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum EventAction {
    /// The server assigned (or confirmed) the conversation id.
    AssignConversation(i64),
    /// Incremental assistant text to append.
    AppendDelta(String),
    /// User-facing error text that replaces the assistant content.
    ShowError(String),
}

#[derive(Debug, thiserror::Error)]
enum PayloadError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Server(String),
}

/// Event-flush procedure: interprets the pending lines of one
/// blank-line-terminated event.
///
/// Events with no data-bearing lines, an empty payload, or the `[DONE]`
/// sentinel are keep-alive noise and produce no actions. Malformed JSON and
/// server-signaled errors share one formatting path and yield a single
/// `ShowError`.
pub(crate) fn interpret_event(lines: &[String]) -> Vec<EventAction> {
    let data_lines: Vec<&str> = lines
        .iter()
        .filter_map(|line| line.strip_prefix(DATA_MARKER))
        .map(str::trim)
        .collect();
    if data_lines.is_empty() {
        return Vec::new();
    }
    let payload = data_lines.join("\n");
    let payload = payload.trim();
    if payload.is_empty() || payload == DONE_SENTINEL {
        return Vec::new();
    }

    let mut actions = Vec::new();
    if let Err(err) = apply_payload(payload, &mut actions) {
        actions.push(EventAction::ShowError(stream_error_text(Some(
            &err.to_string(),
        ))));
    }
    actions
}

fn apply_payload(payload: &str, actions: &mut Vec<EventAction>) -> Result<(), PayloadError> {
    let event: EventPayload = serde_json::from_str(payload)?;

    // The conversation id is picked up before any error is raised, so an
    // error event can still carry the assignment. Id 0 is treated as absent.
    if let Some(id) = event.conversation_id
        && id != 0
    {
        actions.push(EventAction::AssignConversation(id));
    }

    if let Some(error) = event.error {
        let mut message = error;
        if let Some(detail) = event.detail {
            message.push('\n');
            message.push_str(&detail);
        }
        return Err(PayloadError::Server(message));
    }

    if let Some(delta) = event.delta
        && !delta.is_empty()
    {
        actions.push(EventAction::AppendDelta(delta));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn framer_handles_partial_chunk_boundaries() {
        let mut framer = LineFramer::default();
        assert!(framer.push_chunk(b"data: {\"delta\":\"hel").is_empty());
        let completed = framer.push_chunk(b"lo\"}\n\n");
        assert_eq!(completed, vec!["data: {\"delta\":\"hello\"}".to_string(), String::new()]);
    }

    #[test]
    fn framer_keeps_multibyte_sequences_split_across_chunks() {
        let bytes = "data: 你好\n".as_bytes();
        // Split inside the first multi-byte character.
        let mut framer = LineFramer::default();
        assert!(framer.push_chunk(&bytes[..7]).is_empty());
        let completed = framer.push_chunk(&bytes[7..]);
        assert_eq!(completed, vec!["data: 你好".to_string()]);
    }

    #[test]
    fn framer_strips_one_trailing_carriage_return() {
        let mut framer = LineFramer::default();
        let completed = framer.push_chunk(b"data: x\r\n\r\n");
        assert_eq!(completed, vec!["data: x".to_string(), String::new()]);
    }

    #[test]
    fn framer_never_flushes_an_unterminated_tail() {
        let mut framer = LineFramer::default();
        assert!(framer.push_chunk(b"data: {\"delta\":\"drop\"}").is_empty());
    }

    #[test]
    fn events_without_data_lines_are_noise() {
        assert!(interpret_event(&[]).is_empty());
        assert!(interpret_event(&lines(&[": keep-alive", "retry: 3000"])).is_empty());
    }

    #[test]
    fn done_sentinel_and_empty_payloads_are_noise() {
        assert!(interpret_event(&lines(&["data: [DONE]"])).is_empty());
        assert!(interpret_event(&lines(&["data:"])).is_empty());
        assert!(interpret_event(&lines(&["data:   "])).is_empty());
    }

    #[test]
    fn malformed_json_yields_one_error_with_the_fixed_prefix() {
        let actions = interpret_event(&lines(&["data: {not json"]));
        assert_eq!(actions.len(), 1);
        let EventAction::ShowError(text) = &actions[0] else {
            panic!("expected ShowError, got {actions:?}");
        };
        assert!(text.starts_with(STREAM_ERROR_PREFIX));
    }

    #[test]
    fn delta_is_appended_and_empty_delta_is_ignored() {
        assert_eq!(
            interpret_event(&lines(&["data: {\"delta\":\"foo\"}"])),
            vec![EventAction::AppendDelta("foo".into())]
        );
        assert!(interpret_event(&lines(&["data: {\"delta\":\"\"}"])).is_empty());
    }

    #[test]
    fn multiline_data_is_joined_with_newlines_before_parsing() {
        let actions = interpret_event(&lines(&["data: {\"delta\":", "data: \"x\"}"]));
        assert_eq!(actions, vec![EventAction::AppendDelta("x".into())]);
    }

    #[test]
    fn server_error_joins_detail_with_a_newline() {
        let actions = interpret_event(&lines(&[
            "data: {\"error\":\"llm_http_error\",\"detail\":\"quota exceeded\"}",
        ]));
        assert_eq!(
            actions,
            vec![EventAction::ShowError(format!(
                "{STREAM_ERROR_PREFIX}llm_http_error\nquota exceeded"
            ))]
        );
    }

    #[test]
    fn server_error_suppresses_a_delta_in_the_same_event() {
        let actions = interpret_event(&lines(&["data: {\"error\":\"boom\",\"delta\":\"x\"}"]));
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], EventAction::ShowError(_)));
    }

    #[test]
    fn conversation_id_is_assigned_and_zero_is_treated_as_absent() {
        assert_eq!(
            interpret_event(&lines(&["data: {\"conversation_id\": 42}"])),
            vec![EventAction::AssignConversation(42)]
        );
        assert!(interpret_event(&lines(&["data: {\"conversation_id\": 0}"])).is_empty());
    }

    #[test]
    fn conversation_id_and_delta_both_apply_in_order() {
        let actions = interpret_event(&lines(&["data: {\"conversation_id\": 5, \"delta\":\"hi\"}"]));
        assert_eq!(
            actions,
            vec![
                EventAction::AssignConversation(5),
                EventAction::AppendDelta("hi".into()),
            ]
        );
    }

    #[test]
    fn conversation_id_survives_an_error_in_the_same_event() {
        let actions = interpret_event(&lines(&[
            "data: {\"conversation_id\": 9, \"error\":\"boom\"}",
        ]));
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0], EventAction::AssignConversation(9));
        assert!(matches!(actions[1], EventAction::ShowError(_)));
    }

    #[test]
    fn request_serializes_a_null_conversation_id() {
        let request = ChatTurnRequest {
            message: "hello".into(),
            conversation_id: None,
            history: vec![HistoryEntry {
                role: Role::User,
                content: "earlier".into(),
            }],
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert!(value.get("conversation_id").expect("field present").is_null());
        assert_eq!(
            value["history"][0],
            serde_json::json!({"role": "user", "content": "earlier"})
        );
    }

    #[test]
    fn failure_texts_embed_the_message_when_available() {
        assert_eq!(stream_error_text(Some("boom")), format!("{STREAM_ERROR_PREFIX}boom"));
        assert_eq!(
            stream_error_text(None),
            format!("{STREAM_ERROR_PREFIX}{SERVICE_UNAVAILABLE_TEXT}")
        );
        assert_eq!(
            request_failed_text(Some("refused")),
            format!("{REQUEST_FAILED_PREFIX}refused")
        );
        assert_eq!(request_failed_text(None), SERVICE_UNAVAILABLE_TEXT);
    }
}

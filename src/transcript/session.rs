//! Live session state: settled history plus an optional in-progress stream.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::grouping::{ChatEntry, READING_INDICATOR_KEY, build_chat_entries};
use crate::model::RawMessage;

/// Control signals delivered alongside messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// The assistant turn is pending; no text yet.
    ReadingIndicatorBegin,
    /// Replaces any previous delta for the current turn.
    StreamDelta {
        text: String,
        #[serde(
            default,
            rename = "startedAt",
            alias = "started_at",
            skip_serializing_if = "Option::is_none"
        )]
        started_at: Option<i64>,
    },
    /// Folds the latest delta into the history.
    StreamEnd,
}

/// The current text of an in-progress assistant turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    pub text: String,
    pub started_at: i64,
}

impl StreamState {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    messages: Vec<RawMessage>,
    stream: Option<StreamState>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<RawMessage>) -> Self {
        Self {
            messages,
            stream: None,
        }
    }

    pub fn push_message(&mut self, message: RawMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[RawMessage] {
        &self.messages
    }

    pub fn stream(&self) -> Option<&StreamState> {
        self.stream.as_ref()
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::ReadingIndicatorBegin => {
                trace!(component = "session", operation = "reading_indicator", "Turn pending");
                self.stream = Some(StreamState::default());
            }
            StreamEvent::StreamDelta { text, started_at } => {
                let started_at = started_at
                    .or_else(|| self.stream.as_ref().map(|s| s.started_at))
                    .unwrap_or(0);
                trace!(
                    component = "session",
                    operation = "stream_delta",
                    text_len = text.len(),
                    started_at,
                    "Stream delta"
                );
                self.stream = Some(StreamState { text, started_at });
            }
            StreamEvent::StreamEnd => match self.stream.take() {
                Some(state) if !state.is_blank() => {
                    let mut message = RawMessage::new("assistant", state.text);
                    if state.started_at > 0 {
                        message = message.with_timestamp(state.started_at);
                    }
                    debug!(
                        component = "session",
                        operation = "stream_end",
                        history_len = self.messages.len() + 1,
                        "Folded stream into history"
                    );
                    self.messages.push(message);
                }
                Some(_) => {
                    debug!(
                        component = "session",
                        operation = "stream_end",
                        "Stream ended without text"
                    );
                }
                None => {
                    debug!(
                        component = "session",
                        operation = "stream_end",
                        "Stream end without an active stream"
                    );
                }
            },
        }
    }

    /// Grouper input: the history window, then the live stream marker if any.
    pub fn entries(&self, history_limit: usize) -> Vec<ChatEntry> {
        let mut entries = build_chat_entries(&self.messages, history_limit);
        if let Some(stream) = &self.stream {
            if stream.is_blank() {
                entries.push(ChatEntry::ReadingIndicator {
                    key: READING_INDICATOR_KEY.to_string(),
                });
            } else {
                entries.push(ChatEntry::Stream {
                    text: stream.text.clone(),
                    started_at: stream.started_at,
                    key: format!("stream:{}", stream.started_at),
                });
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_timestamp;

    fn delta(text: &str, started_at: Option<i64>) -> StreamEvent {
        StreamEvent::StreamDelta {
            text: text.to_string(),
            started_at,
        }
    }

    #[test]
    fn delta_replaces_previous_delta() {
        let mut session = ChatSession::new();
        session.apply(delta("Hel", Some(1_700_000_000_000)));
        session.apply(delta("Hello", None));
        let stream = session.stream().unwrap();
        assert_eq!(stream.text, "Hello");
        assert_eq!(stream.started_at, 1_700_000_000_000);
    }

    #[test]
    fn stream_end_folds_text_into_assistant_message() {
        let mut session = ChatSession::new();
        session.push_message(RawMessage::new("user", "hi"));
        session.apply(delta("Hello there", Some(1_700_000_000_000)));
        session.apply(StreamEvent::StreamEnd);

        assert!(!session.is_streaming());
        assert_eq!(session.messages().len(), 2);
        let folded = &session.messages()[1];
        assert_eq!(folded.role, "assistant");
        assert_eq!(folded.content.as_ref().and_then(|c| c.as_str()), Some("Hello there"));
        assert_eq!(normalize_timestamp(folded), 1_700_000_000_000);
    }

    #[test]
    fn blank_stream_end_adds_nothing() {
        let mut session = ChatSession::new();
        session.apply(StreamEvent::ReadingIndicatorBegin);
        session.apply(delta("   ", None));
        session.apply(StreamEvent::StreamEnd);
        assert!(session.messages().is_empty());
        assert!(!session.is_streaming());
    }

    #[test]
    fn entries_end_with_indicator_or_stream() {
        let mut session = ChatSession::from_messages(vec![RawMessage::new("user", "q")]);
        session.apply(StreamEvent::ReadingIndicatorBegin);
        let entries = session.entries(10);
        assert!(matches!(entries.last(), Some(ChatEntry::ReadingIndicator { .. })));

        session.apply(delta("thinking aloud", Some(42_000)));
        let entries = session.entries(10);
        match entries.last() {
            Some(ChatEntry::Stream { text, key, .. }) => {
                assert_eq!(text, "thinking aloud");
                assert_eq!(key, "stream:42000");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stream_end_without_stream_is_noop() {
        let mut session = ChatSession::new();
        session.apply(StreamEvent::StreamEnd);
        assert!(session.messages().is_empty());
    }

    #[test]
    fn events_deserialize_from_wire_names() {
        let begin: StreamEvent =
            serde_json::from_str(r#"{"type":"reading-indicator-begin"}"#).unwrap();
        assert_eq!(begin, StreamEvent::ReadingIndicatorBegin);
        let d: StreamEvent =
            serde_json::from_str(r#"{"type":"stream-delta","text":"x","startedAt":7}"#).unwrap();
        assert_eq!(d, delta("x", Some(7)));
        let end: StreamEvent = serde_json::from_str(r#"{"type":"stream-end"}"#).unwrap();
        assert_eq!(end, StreamEvent::StreamEnd);
    }
}

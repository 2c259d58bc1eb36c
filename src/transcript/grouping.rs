//! Folding a linear entry sequence into visual groups.

use serde::Serialize;
use tracing::{debug, trace};

use crate::model::{CanonicalRole, NormalizedMessage, RawMessage};
use crate::normalize::{message_key, normalize_message};

pub const HISTORY_NOTICE_KEY: &str = "chat:history:notice";
pub const READING_INDICATOR_KEY: &str = "stream:indicator";

/// One input item for the grouper.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEntry {
    Message { message: RawMessage, key: String },
    /// The assistant is about to respond; no text yet.
    ReadingIndicator { key: String },
    /// The assistant is emitting partial text.
    Stream {
        text: String,
        started_at: i64,
        key: String,
    },
}

impl ChatEntry {
    pub fn key(&self) -> &str {
        match self {
            ChatEntry::Message { key, .. }
            | ChatEntry::ReadingIndicator { key }
            | ChatEntry::Stream { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedMessage {
    pub message: NormalizedMessage,
    pub key: String,
}

/// Consecutive messages sharing one canonical role.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageGroup {
    pub role: CanonicalRole,
    pub messages: Vec<GroupedMessage>,
    /// Timestamp of the first message.
    pub timestamp: i64,
    /// Set on an assistant group directly followed by live stream output.
    pub is_streaming: bool,
}

impl MessageGroup {
    fn open(first: GroupedMessage) -> Self {
        Self {
            role: first.message.role,
            timestamp: first.message.timestamp,
            messages: vec![first],
            is_streaming: false,
        }
    }

    /// Render key, derived from the first message.
    pub fn key(&self) -> String {
        let first = self.messages.first().map(|m| m.key.as_str()).unwrap_or("");
        format!("group:{}:{}", self.role.as_str(), first)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Grouper output: groups interleaved with pass-through markers.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptItem {
    Group(MessageGroup),
    ReadingIndicator {
        key: String,
    },
    Stream {
        text: String,
        started_at: i64,
        key: String,
    },
}

/// Summary counts of a grouping pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupingStats {
    pub groups: usize,
    pub messages: usize,
    pub markers: usize,
}

impl GroupingStats {
    pub fn of(items: &[TranscriptItem]) -> Self {
        items.iter().fold(Self::default(), |mut stats, item| {
            match item {
                TranscriptItem::Group(group) => {
                    stats.groups += 1;
                    stats.messages += group.len();
                }
                _ => stats.markers += 1,
            }
            stats
        })
    }
}

/// Group entries in a single left-to-right pass.
///
/// A group closes whenever the canonical role changes or a marker entry is
/// reached; markers are never merged into groups.
pub fn group_entries(entries: &[ChatEntry]) -> Vec<TranscriptItem> {
    let mut items = Vec::new();
    let mut current: Option<MessageGroup> = None;

    for entry in entries {
        match entry {
            ChatEntry::Message { message, key } => {
                let grouped = GroupedMessage {
                    message: normalize_message(message),
                    key: key.clone(),
                };
                match current.as_mut() {
                    Some(group) if group.role == grouped.message.role => {
                        group.messages.push(grouped);
                    }
                    _ => {
                        if let Some(done) = current.replace(MessageGroup::open(grouped)) {
                            close_group(&mut items, done);
                        }
                    }
                }
            }
            ChatEntry::ReadingIndicator { key } => {
                if let Some(done) = current.take() {
                    close_group(&mut items, done);
                }
                items.push(TranscriptItem::ReadingIndicator { key: key.clone() });
            }
            ChatEntry::Stream {
                text,
                started_at,
                key,
            } => {
                if let Some(mut done) = current.take() {
                    done.is_streaming = done.role == CanonicalRole::Assistant;
                    close_group(&mut items, done);
                }
                items.push(TranscriptItem::Stream {
                    text: text.clone(),
                    started_at: *started_at,
                    key: key.clone(),
                });
            }
        }
    }
    if let Some(done) = current {
        close_group(&mut items, done);
    }

    let stats = GroupingStats::of(&items);
    debug!(
        component = "grouping",
        operation = "group_entries",
        entries = entries.len(),
        groups = stats.groups,
        markers = stats.markers,
        "Grouped transcript entries"
    );
    items
}

fn close_group(items: &mut Vec<TranscriptItem>, group: MessageGroup) {
    trace!(
        component = "grouping",
        operation = "close_group",
        role = group.role.as_str(),
        messages = group.len(),
        "Closed group"
    );
    items.push(TranscriptItem::Group(group));
}

/// Text of the synthetic notice shown when older history is hidden.
pub fn history_notice_text(limit: usize, hidden: usize) -> String {
    format!("Showing last {limit} messages ({hidden} hidden).")
}

/// Build grouper input for the most recent `history_limit` messages.
///
/// When older messages are hidden a single system notice is prepended. Keys
/// use each message's position in the full history so they stay stable as
/// the window slides.
pub fn build_chat_entries(messages: &[RawMessage], history_limit: usize) -> Vec<ChatEntry> {
    let start = messages.len().saturating_sub(history_limit);
    let mut entries = Vec::with_capacity(messages.len() - start + 1);

    if start > 0 {
        debug!(
            component = "grouping",
            operation = "history_window",
            total = messages.len(),
            hidden = start,
            history_limit,
            "Hiding older messages"
        );
        entries.push(ChatEntry::Message {
            message: RawMessage::new("system", history_notice_text(history_limit, start)),
            key: HISTORY_NOTICE_KEY.to_string(),
        });
    }

    entries.extend(
        messages[start..]
            .iter()
            .enumerate()
            .map(|(offset, message)| ChatEntry::Message {
                key: message_key(message, start + offset),
                message: message.clone(),
            }),
    );
    entries
}

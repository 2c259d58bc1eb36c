//! Transcript assembly: grouping, live stream state and file ingestion.

pub mod grouping;
pub mod load;
pub mod session;

pub use grouping::{
    ChatEntry, GroupedMessage, GroupingStats, HISTORY_NOTICE_KEY, MessageGroup,
    READING_INDICATOR_KEY, TranscriptItem, build_chat_entries, group_entries,
};
pub use load::{
    LoadStats, LoadedTranscript, TranscriptError, load_transcript, parse_transcript, read_transcript,
};
pub use session::{ChatSession, StreamEvent, StreamState};

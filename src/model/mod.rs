pub mod types;

pub use types::{
    CanonicalRole, ContentBlock, ExtractedContent, ImageBlock, NormalizedMessage, RawMessage,
    ToolCard,
};

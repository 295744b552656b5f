//! Prompt document parsing
//!
//! Splits a document into front matter metadata and template body, and turns
//! a rendered template back into structured messages by decoding the marker
//! protocol the helpers emit.

mod frontmatter;
mod messages;

pub use frontmatter::{RESERVED_METADATA_KEYWORDS, parse_document};
pub use messages::{
    HISTORY_MARKER_PREFIX, MEDIA_MARKER_PREFIX, ROLE_MARKER_PREFIX, SECTION_MARKER_PREFIX, insert_history,
    to_messages, to_parts,
};

//! Message reconstruction from rendered marker text
//!
//! Helpers emit `<<<dotprompt:...>>>` markers into the flat template output.
//! This module splits that output back into role-tagged messages, splices in
//! conversation history, and turns media and section markers into parts.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::{DotpromptError, Result};
use crate::types::{DataArgument, Message, Metadata, Part};

pub const ROLE_MARKER_PREFIX: &str = "<<<dotprompt:role:";
pub const HISTORY_MARKER_PREFIX: &str = "<<<dotprompt:history";
pub const MEDIA_MARKER_PREFIX: &str = "<<<dotprompt:media:";
pub const SECTION_MARKER_PREFIX: &str = "<<<dotprompt:section";

static ROLE_AND_HISTORY_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(<<<dotprompt:(?:role:[a-z]+|history))>>>").expect("role and history marker regex")
});

static MEDIA_AND_SECTION_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(<<<dotprompt:(?:media:url|section).*?)>>>").expect("media and section marker regex")
});

/// A message under construction: either raw template text still to be split
/// into parts, or ready-made content copied from history
struct MessageSource {
    role: String,
    source: String,
    content: Option<Vec<Part>>,
    metadata: Option<Metadata>,
}

impl MessageSource {
    fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            source: String::new(),
            content: None,
            metadata: None,
        }
    }
}

/// Convert rendered template text into messages.
///
/// Text before the first role marker belongs to a `user` message. History
/// from `data` is spliced in at `{{history}}`, or placed by
/// [`insert_history`] when the template has no history marker.
pub fn to_messages(rendered: &str, data: Option<&DataArgument>) -> Result<Vec<Message>> {
    debug!(rendered_len = rendered.len(), has_data = data.is_some(), "to_messages: called");
    let history: &[Message] = data.map(|d| d.messages.as_slice()).unwrap_or_default();

    let mut sources = Vec::new();
    let mut current = MessageSource::new("user");

    for piece in split_keep_markers(rendered, &ROLE_AND_HISTORY_MARKER_RE) {
        if let Some(role) = piece.strip_prefix(ROLE_MARKER_PREFIX) {
            if current.source.trim().is_empty() {
                debug!(%role, "to_messages: relabeling current message");
                current.role = role.to_string();
            } else {
                debug!(%role, "to_messages: starting new message");
                sources.push(std::mem::replace(&mut current, MessageSource::new(role)));
            }
        } else if piece.starts_with(HISTORY_MARKER_PREFIX) {
            debug!(history_len = history.len(), "to_messages: splicing history at marker");
            sources.push(std::mem::replace(&mut current, MessageSource::new("model")));
            sources.extend(history.iter().map(|message| MessageSource {
                role: message.role.clone(),
                source: String::new(),
                content: Some(message.content.clone()),
                metadata: Some(history_metadata(message)),
            }));
        } else {
            current.source.push_str(piece);
        }
    }
    sources.push(current);

    let mut messages = Vec::with_capacity(sources.len());
    for source in sources {
        let content = match source.content {
            Some(content) => content,
            None if source.source.is_empty() => continue,
            None => to_parts(&source.source)?,
        };
        messages.push(Message {
            role: source.role,
            content,
            metadata: source.metadata,
        });
    }

    Ok(insert_history(messages, history))
}

/// Copy of the message's metadata tagged with `purpose: history`
fn history_metadata(message: &Message) -> Metadata {
    let mut metadata = message.metadata.clone().unwrap_or_default();
    metadata.insert("purpose".to_string(), Value::String("history".to_string()));
    metadata
}

/// Split message text into text, media and pending parts
pub fn to_parts(source: &str) -> Result<Vec<Part>> {
    debug!(source_len = source.len(), "to_parts: called");
    split_keep_markers(source, &MEDIA_AND_SECTION_MARKER_RE)
        .into_iter()
        .map(|piece| {
            if piece.starts_with(MEDIA_MARKER_PREFIX) {
                parse_media_part(piece)
            } else if piece.starts_with(SECTION_MARKER_PREFIX) {
                parse_section_part(piece)
            } else {
                Ok(Part::text(piece))
            }
        })
        .collect()
}

/// `<<<dotprompt:media:url <url>[ <contentType>]`
fn parse_media_part(piece: &str) -> Result<Part> {
    let fields: Vec<&str> = piece.split(' ').collect();
    match fields.as_slice() {
        [_, url] => {
            debug!(%url, "parse_media_part: media without content type");
            Ok(Part::media(*url, None))
        }
        [_, url, content_type] => {
            debug!(%url, %content_type, "parse_media_part: media with content type");
            let content_type = (!content_type.trim().is_empty()).then(|| content_type.to_string());
            Ok(Part::media(*url, content_type))
        }
        _ => Err(DotpromptError::InvalidMarker(format!(
            "media marker must have a url and an optional content type, got: {}>>>",
            piece
        ))),
    }
}

/// `<<<dotprompt:section <purpose>`
fn parse_section_part(piece: &str) -> Result<Part> {
    let fields: Vec<&str> = piece.split(' ').collect();
    match fields.as_slice() {
        [_, purpose] => {
            debug!(%purpose, "parse_section_part: pending section");
            Ok(Part::pending(*purpose))
        }
        _ => Err(DotpromptError::InvalidMarker(format!(
            "section marker must name exactly one purpose, got: {}>>>",
            piece
        ))),
    }
}

/// Place conversation history among the rendered messages.
///
/// Nothing happens when there is no history or a message is already tagged
/// as history. Otherwise history goes before a trailing `user` message, or
/// at the end.
pub fn insert_history(mut messages: Vec<Message>, history: &[Message]) -> Vec<Message> {
    debug!(messages = messages.len(), history = history.len(), "insert_history: called");
    if history.is_empty() || messages.iter().any(Message::is_history) {
        debug!("insert_history: nothing to insert");
        return messages;
    }
    if messages.is_empty() {
        debug!("insert_history: no messages, returning history");
        return history.to_vec();
    }

    let ends_with_user = messages.last().is_some_and(|m| m.role == "user");
    if ends_with_user {
        debug!("insert_history: inserting before trailing user message");
        let at = messages.len() - 1;
        messages.splice(at..at, history.iter().cloned());
    } else {
        debug!("insert_history: appending history");
        messages.extend(history.iter().cloned());
    }
    messages
}

/// Split on `re`, keeping each match's first capture group as its own piece
/// and dropping whitespace-only pieces
fn split_keep_markers<'a>(source: &'a str, re: &Regex) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for caps in re.captures_iter(source) {
        let (Some(whole), Some(marker)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        pieces.push(&source[last..whole.start()]);
        pieces.push(marker.as_str());
        last = whole.end();
    }
    pieces.push(&source[last..]);
    pieces.retain(|piece| !piece.trim().is_empty());
    pieces
}

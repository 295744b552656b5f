//! Message and content part types

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::Metadata;

/// Location and type of a media attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaContent {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// A request from the model to invoke a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,

    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// The result of a tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// One piece of message content. Exactly one kind of payload per part;
/// any kind may also carry metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    Data {
        data: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    Media {
        media: MediaContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    ToolRequest {
        #[serde(rename = "toolRequest")]
        tool_request: ToolRequest,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    ToolResponse {
        #[serde(rename = "toolResponse")]
        tool_response: ToolResponse,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    /// Placeholder to be filled later; metadata carries `purpose` and `pending: true`
    Pending { metadata: Metadata },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            metadata: None,
        }
    }

    pub fn media(url: impl Into<String>, content_type: Option<String>) -> Self {
        Self::Media {
            media: MediaContent {
                url: url.into(),
                content_type,
            },
            metadata: None,
        }
    }

    pub fn pending(purpose: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("purpose".to_string(), Value::String(purpose.into()));
        metadata.insert("pending".to_string(), Value::Bool(true));
        Self::Pending { metadata }
    }

    /// Text payload, if this is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            Self::Text { metadata, .. }
            | Self::Data { metadata, .. }
            | Self::Media { metadata, .. }
            | Self::ToolRequest { metadata, .. }
            | Self::ToolResponse { metadata, .. } => metadata.as_ref(),
            Self::Pending { metadata } => Some(metadata),
        }
    }
}

/// A chat message: role plus ordered content parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// `user`, `model`, `system`, `tool`, ...
    pub role: String,

    #[serde(deserialize_with = "deserialize_parts")]
    pub content: Vec<Part>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: Vec<Part>) -> Self {
        Self {
            role: role.into(),
            content,
            metadata: None,
        }
    }

    /// Whether this message was spliced in from conversation history
    pub fn is_history(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("purpose"))
            .and_then(Value::as_str)
            == Some("history")
    }
}

/// A retrieved document made available to the template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(deserialize_with = "deserialize_parts")]
    pub content: Vec<Part>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Per-render data: template variables, context, documents, and history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataArgument {
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub input: Map<String, Value>,

    /// Extra rendering context; wins over `input` on key collisions
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub docs: Vec<Document>,

    /// Prior conversation history
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
}

/// Decode a content list, skipping entries that match no part kind
fn deserialize_parts<'de, D>(deserializer: D) -> Result<Vec<Part>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    let mut parts = Vec::with_capacity(raw.len());
    for value in &raw {
        match Part::deserialize(value) {
            Ok(Part::Pending { metadata }) if metadata.get("pending") != Some(&Value::Bool(true)) => {
                warn!(part = %value, "Skipping unrecognized content part with metadata only");
            }
            Ok(part) => parts.push(part),
            Err(e) => {
                warn!(part = %value, error = %e, "Skipping unrecognized content part");
            }
        }
    }
    Ok(parts)
}

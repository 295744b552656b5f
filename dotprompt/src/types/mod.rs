//! Core data model
//!
//! Everything that crosses the library boundary: parsed prompts, metadata,
//! messages and their parts. All types serialize to the camelCase JSON shape
//! shared by every dotprompt implementation.

mod message;
mod metadata;

use serde::{Deserialize, Deserializer};

pub use message::{DataArgument, Document, MediaContent, Message, Part, ToolRequest, ToolResponse};
pub use metadata::{
    ParsedPrompt, PromptInputConfig, PromptMetadata, PromptOutputConfig, RenderedPrompt, ToolDefinition,
};

/// A JSON Schema object; arbitrary nesting is carried by `serde_json::Value`
pub type JsonSchema = serde_json::Map<String, serde_json::Value>;

/// Free-form metadata attached to messages, parts and prompts
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Decode an explicit YAML/JSON `null` as the field's empty value
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

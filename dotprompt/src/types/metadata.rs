//! Prompt metadata types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{Message, Metadata, null_as_default};

/// A tool callable by the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub input_schema: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// Input variables: defaults and (Picoschema or JSON Schema) schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptInputConfig {
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Map::is_empty")]
    pub default: Map<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl PromptInputConfig {
    pub fn is_empty(&self) -> bool {
        self.default.is_empty() && self.schema.is_none()
    }
}

/// Expected output: format and schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptOutputConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl PromptOutputConfig {
    pub fn is_empty(&self) -> bool {
        self.format.is_none() && self.schema.is_none()
    }
}

/// Metadata carried by a prompt document, either from front matter or
/// supplied by the caller as overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PromptMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Tool names; after resolution only the names that stayed unresolved
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub tool_defs: Vec<ToolDefinition>,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "PromptInputConfig::is_empty")]
    pub input: PromptInputConfig,

    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "PromptOutputConfig::is_empty")]
    pub output: PromptOutputConfig,

    /// The complete front matter mapping as parsed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Map<String, Value>>,

    /// Namespaced front matter keys (`ns.field`), grouped by namespace
    #[serde(deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub ext: BTreeMap<String, Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl PromptMetadata {
    /// Layer `other` on top of `self`.
    ///
    /// Every non-empty field of `other` replaces the field in `self`
    /// outright, except `config`, which is merged key by key with `other`
    /// winning on collisions.
    pub fn merge_from(&mut self, other: &PromptMetadata) {
        debug!(
            other_model = ?other.model,
            other_config_keys = other.config.len(),
            "PromptMetadata::merge_from: called"
        );
        if other.name.is_some() {
            self.name = other.name.clone();
        }
        if other.variant.is_some() {
            self.variant = other.variant.clone();
        }
        if other.version.is_some() {
            self.version = other.version.clone();
        }
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        if other.model.is_some() {
            self.model = other.model.clone();
        }
        if !other.tools.is_empty() {
            self.tools = other.tools.clone();
        }
        if !other.tool_defs.is_empty() {
            self.tool_defs = other.tool_defs.clone();
        }
        for (key, value) in &other.config {
            self.config.insert(key.clone(), value.clone());
        }
        if !other.input.is_empty() {
            self.input = other.input.clone();
        }
        if !other.output.is_empty() {
            self.output = other.output.clone();
        }
        if other.raw.is_some() {
            self.raw = other.raw.clone();
        }
        if !other.ext.is_empty() {
            self.ext = other.ext.clone();
        }
        if other.metadata.is_some() {
            self.metadata = other.metadata.clone();
        }
    }
}

/// A parsed prompt document: metadata plus the template body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedPrompt {
    #[serde(flatten)]
    pub metadata: PromptMetadata,

    /// Template body with surrounding spaces and tabs stripped
    pub template: String,
}

/// Final output of a render: resolved metadata plus the messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedPrompt {
    #[serde(flatten)]
    pub metadata: PromptMetadata,

    pub messages: Vec<Message>,
}

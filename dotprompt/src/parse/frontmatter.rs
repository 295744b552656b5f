//! Front matter extraction

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::{ParsedPrompt, PromptMetadata};

/// Front matter keys that map onto `PromptMetadata` fields
pub const RESERVED_METADATA_KEYWORDS: [&str; 12] = [
    "config",
    "description",
    "ext",
    "input",
    "model",
    "name",
    "output",
    "raw",
    "toolDefs",
    "tools",
    "variant",
    "version",
];

static FRONTMATTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^---\s*\n([\s\S]*?)\n---\s*\n([\s\S]*)$").expect("front matter regex"));

/// Parse a prompt document into metadata and template body.
///
/// Never fails: a document without front matter, or with front matter that
/// does not parse, yields default metadata and the trimmed source as
/// template.
pub fn parse_document(source: &str) -> ParsedPrompt {
    debug!(source_len = source.len(), "parse_document: called");

    let Some(caps) = FRONTMATTER_RE.captures(source) else {
        debug!("parse_document: no front matter");
        return fallback(source);
    };
    let frontmatter = caps.get(1).map_or("", |m| m.as_str());
    let body = caps.get(2).map_or("", |m| m.as_str());

    let raw = match parse_frontmatter(frontmatter) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Dotprompt: Error parsing YAML frontmatter");
            return fallback(source);
        }
    };

    match build_metadata(raw) {
        Ok(metadata) => {
            debug!(
                model = ?metadata.model,
                ext_namespaces = metadata.ext.len(),
                "parse_document: parsed front matter"
            );
            ParsedPrompt {
                metadata,
                template: trim_blanks(body).to_string(),
            }
        }
        Err(e) => {
            warn!(error = %e, "Dotprompt: Invalid front matter value, using default metadata");
            ParsedPrompt {
                metadata: PromptMetadata::default(),
                template: trim_blanks(body).to_string(),
            }
        }
    }
}

fn fallback(source: &str) -> ParsedPrompt {
    ParsedPrompt {
        metadata: PromptMetadata::default(),
        template: trim_blanks(source).to_string(),
    }
}

/// Strip leading and trailing spaces and tabs; newlines are content
fn trim_blanks(s: &str) -> &str {
    s.trim_matches(|c| c == ' ' || c == '\t')
}

fn parse_frontmatter(frontmatter: &str) -> Result<Map<String, Value>, String> {
    if frontmatter.trim().is_empty() {
        debug!("parse_frontmatter: blank front matter");
        return Ok(Map::new());
    }

    match serde_yaml::from_str::<Value>(frontmatter).map_err(|e| e.to_string())? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(format!("front matter must be a mapping, got: {}", other)),
    }
}

fn build_metadata(raw: Map<String, Value>) -> Result<PromptMetadata, String> {
    let mut metadata = PromptMetadata::default();

    for (key, value) in &raw {
        if value.is_null() {
            continue;
        }
        if RESERVED_METADATA_KEYWORDS.contains(&key.as_str()) {
            assign_reserved(&mut metadata, key, value)?;
            continue;
        }
        if let Some((namespace, field)) = key.rsplit_once('.') {
            debug!(%namespace, %field, "build_metadata: extension field");
            metadata
                .ext
                .entry(namespace.to_string())
                .or_default()
                .insert(field.to_string(), value.clone());
        }
    }

    metadata.raw = Some(raw);
    Ok(metadata)
}

fn assign_reserved(metadata: &mut PromptMetadata, key: &str, value: &Value) -> Result<(), String> {
    match key {
        "name" => metadata.name = Some(scalar_string(key, value)?),
        "variant" => metadata.variant = Some(scalar_string(key, value)?),
        "version" => metadata.version = Some(scalar_string(key, value)?),
        "description" => metadata.description = Some(scalar_string(key, value)?),
        "model" => metadata.model = Some(scalar_string(key, value)?),
        "tools" => metadata.tools = typed(key, value)?,
        "toolDefs" => metadata.tool_defs = typed(key, value)?,
        "config" => metadata.config = typed(key, value)?,
        "input" => metadata.input = typed(key, value)?,
        "output" => metadata.output = typed(key, value)?,
        // `raw` and `ext` are computed from the whole document instead
        _ => {}
    }
    Ok(())
}

/// Strings pass through; numbers and booleans (`version: 2`) are stringified
fn scalar_string(key: &str, value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("'{}' must be a string, got: {}", key, other)),
    }
}

fn typed<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T, String> {
    serde_json::from_value(value.clone()).map_err(|e| format!("'{}' has the wrong shape: {}", key, e))
}

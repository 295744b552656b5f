//! Metadata resolution
//!
//! Layers model defaults, front matter and call-time overrides into one
//! `PromptMetadata`, then resolves tool names to definitions and compiles
//! input and output schemas.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{BoxError, DotpromptError, Result};
use crate::picoschema::{SchemaResolver, picoschema};
use crate::types::{JsonSchema, PromptMetadata, ToolDefinition};

/// Looks up the source of a partial by name
pub trait PartialResolver: Send + Sync {
    fn resolve_partial(&self, name: &str) -> std::result::Result<Option<String>, BoxError>;
}

impl<F> PartialResolver for F
where
    F: Fn(&str) -> std::result::Result<Option<String>, BoxError> + Send + Sync,
{
    fn resolve_partial(&self, name: &str) -> std::result::Result<Option<String>, BoxError> {
        self(name)
    }
}

/// Looks up a tool definition by name
pub trait ToolResolver: Send + Sync {
    fn resolve_tool(&self, name: &str) -> std::result::Result<Option<ToolDefinition>, BoxError>;
}

impl<F> ToolResolver for F
where
    F: Fn(&str) -> std::result::Result<Option<ToolDefinition>, BoxError> + Send + Sync,
{
    fn resolve_tool(&self, name: &str) -> std::result::Result<Option<ToolDefinition>, BoxError> {
        self(name)
    }
}

/// Layer each metadata source over `base`, in order
pub fn resolve_metadata(base: PromptMetadata, layers: &[&PromptMetadata]) -> PromptMetadata {
    debug!(layers = layers.len(), "resolve_metadata: called");
    layers.iter().fold(base, |mut out, layer| {
        out.merge_from(layer);
        out
    })
}

/// Model defaults plus the tool and schema registries
#[derive(Default)]
pub struct MetadataResolver {
    pub default_model: Option<String>,
    pub model_configs: HashMap<String, Value>,
    tools: HashMap<String, ToolDefinition>,
    tool_resolver: Option<Box<dyn ToolResolver>>,
    schemas: HashMap<String, JsonSchema>,
    schema_resolver: Option<Box<dyn SchemaResolver>>,
}

impl MetadataResolver {
    pub fn new(
        default_model: Option<String>,
        model_configs: HashMap<String, Value>,
        tool_resolver: Option<Box<dyn ToolResolver>>,
        schema_resolver: Option<Box<dyn SchemaResolver>>,
    ) -> Self {
        debug!(?default_model, model_configs = model_configs.len(), "MetadataResolver::new: called");
        Self {
            default_model,
            model_configs,
            tools: HashMap::new(),
            tool_resolver,
            schemas: HashMap::new(),
            schema_resolver,
        }
    }

    /// Register a tool definition under its name; last write wins
    pub fn define_tool(&mut self, def: ToolDefinition) {
        debug!(name = %def.name, "MetadataResolver::define_tool: called");
        self.tools.insert(def.name.clone(), def);
    }

    /// Register a named schema; last write wins
    pub fn define_schema(&mut self, name: impl Into<String>, schema: JsonSchema) {
        let name = name.into();
        debug!(%name, "MetadataResolver::define_schema: called");
        self.schemas.insert(name, schema);
    }

    /// Resolve the full metadata for one render.
    ///
    /// The selected model (override, then front matter, then the default)
    /// picks the base config from `model_configs`; front matter and
    /// overrides are layered on top.
    pub fn render_metadata(&self, parsed: &PromptMetadata, overrides: Option<&PromptMetadata>) -> Result<PromptMetadata> {
        let selected_model = overrides
            .and_then(|o| o.model.as_deref())
            .or(parsed.model.as_deref())
            .or(self.default_model.as_deref());
        debug!(?selected_model, "MetadataResolver::render_metadata: called");

        let config = selected_model
            .and_then(|model| self.model_configs.get(model))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let base = PromptMetadata {
            config,
            ..Default::default()
        };

        let mut layers = vec![parsed];
        if let Some(overrides) = overrides {
            layers.push(overrides);
        }
        let merged = resolve_metadata(base, &layers);

        let resolved = self.resolve_tools(merged)?;
        self.render_picoschema(resolved)
    }

    /// Move resolvable tool names into `tool_defs`.
    ///
    /// Registry entries win over the resolver. Without a resolver an unknown
    /// name stays in `tools`; with one, a name it cannot resolve is an error.
    pub fn resolve_tools(&self, mut meta: PromptMetadata) -> Result<PromptMetadata> {
        debug!(tools = meta.tools.len(), "MetadataResolver::resolve_tools: called");
        let mut unresolved = Vec::new();

        for name in std::mem::take(&mut meta.tools) {
            if let Some(def) = self.tools.get(&name) {
                debug!(%name, "MetadataResolver::resolve_tools: found in registry");
                meta.tool_defs.push(def.clone());
                continue;
            }

            let Some(resolver) = &self.tool_resolver else {
                debug!(%name, "MetadataResolver::resolve_tools: no resolver, keeping name");
                unresolved.push(name);
                continue;
            };

            match resolver
                .resolve_tool(&name)
                .map_err(|e| DotpromptError::resolver("tool", &name, e))?
            {
                Some(def) => {
                    debug!(%name, "MetadataResolver::resolve_tools: resolved by resolver");
                    meta.tool_defs.push(def);
                }
                None => return Err(DotpromptError::ToolNotFound { name }),
            }
        }

        meta.tools = unresolved;
        Ok(meta)
    }

    /// Compile `input.schema` and `output.schema` to JSON Schema
    pub fn render_picoschema(&self, mut meta: PromptMetadata) -> Result<PromptMetadata> {
        debug!(
            has_input_schema = meta.input.schema.is_some(),
            has_output_schema = meta.output.schema.is_some(),
            "MetadataResolver::render_picoschema: called"
        );
        if meta.input.schema.is_none() && meta.output.schema.is_none() {
            return Ok(meta);
        }

        let resolver = RegistrySchemaResolver(self);
        if let Some(schema) = meta.input.schema.take() {
            meta.input.schema = picoschema(Some(&schema), Some(&resolver))?.map(Value::Object);
        }
        if let Some(schema) = meta.output.schema.take() {
            meta.output.schema = picoschema(Some(&schema), Some(&resolver))?.map(Value::Object);
        }
        info!("Compiled prompt schemas");
        Ok(meta)
    }

    /// Registered schema by name, falling back to the configured resolver
    pub fn wrapped_schema_resolver(&self, name: &str) -> std::result::Result<Option<JsonSchema>, BoxError> {
        debug!(%name, "MetadataResolver::wrapped_schema_resolver: called");
        if let Some(schema) = self.schemas.get(name) {
            return Ok(Some(schema.clone()));
        }
        match &self.schema_resolver {
            Some(resolver) => resolver.resolve_schema(name),
            None => Ok(None),
        }
    }
}

struct RegistrySchemaResolver<'a>(&'a MetadataResolver);

impl SchemaResolver for RegistrySchemaResolver<'_> {
    fn resolve_schema(&self, name: &str) -> std::result::Result<Option<JsonSchema>, BoxError> {
        self.0.wrapped_schema_resolver(name)
    }
}

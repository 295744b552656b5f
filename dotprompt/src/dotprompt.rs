//! Prompt compilation and rendering
//!
//! [`Dotprompt`] owns the handlebars registry plus the tool, schema and
//! partial sources. Compiling a document registers its template and returns
//! a [`PromptFunction`] that renders it into messages any number of times.

use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::LazyLock;

use handlebars::Handlebars;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{DotpromptError, Result};
use crate::helpers::{BoxedHelper, builtin_helpers};
use crate::parse::{parse_document, to_messages};
use crate::picoschema::SchemaResolver;
use crate::resolve::{MetadataResolver, PartialResolver, ToolResolver};
use crate::types::{DataArgument, JsonSchema, ParsedPrompt, PromptMetadata, RenderedPrompt, ToolDefinition};

static PARTIAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{~?>\s*([^\s}]+)").expect("partial reference regex"));

/// Construction options for [`Dotprompt`]
#[derive(Default)]
pub struct DotpromptOptions {
    /// Model used when neither the document nor the caller names one
    pub default_model: Option<String>,
    /// Per-model base config, keyed by model name
    pub model_configs: HashMap<String, Value>,
    pub helpers: HashMap<String, BoxedHelper>,
    pub partials: HashMap<String, String>,
    pub tools: HashMap<String, ToolDefinition>,
    pub tool_resolver: Option<Box<dyn ToolResolver>>,
    pub schemas: HashMap<String, JsonSchema>,
    pub schema_resolver: Option<Box<dyn SchemaResolver>>,
    pub partial_resolver: Option<Box<dyn PartialResolver>>,
}

impl DotpromptOptions {
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_model_config(mut self, model: impl Into<String>, config: Value) -> Self {
        self.model_configs.insert(model.into(), config);
        self
    }

    pub fn with_helper(mut self, name: impl Into<String>, helper: BoxedHelper) -> Self {
        self.helpers.insert(name.into(), helper);
        self
    }

    pub fn with_partial(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.partials.insert(name.into(), source.into());
        self
    }

    pub fn with_tool(mut self, def: ToolDefinition) -> Self {
        self.tools.insert(def.name.clone(), def);
        self
    }

    pub fn with_tool_resolver(mut self, resolver: impl ToolResolver + 'static) -> Self {
        self.tool_resolver = Some(Box::new(resolver));
        self
    }

    pub fn with_schema(mut self, name: impl Into<String>, schema: JsonSchema) -> Self {
        self.schemas.insert(name.into(), schema);
        self
    }

    pub fn with_schema_resolver(mut self, resolver: impl SchemaResolver + 'static) -> Self {
        self.schema_resolver = Some(Box::new(resolver));
        self
    }

    pub fn with_partial_resolver(mut self, resolver: impl PartialResolver + 'static) -> Self {
        self.partial_resolver = Some(Box::new(resolver));
        self
    }
}

/// Compiles prompt documents and renders them into messages
pub struct Dotprompt {
    handlebars: Handlebars<'static>,
    known_helpers: HashSet<String>,
    known_partials: HashSet<String>,
    resolver: MetadataResolver,
    partial_resolver: Option<Box<dyn PartialResolver>>,
}

impl Dotprompt {
    /// Build an instance with the built-in helpers plus everything in `options`.
    ///
    /// Helpers from `options` are registered first, so a caller-supplied
    /// helper replaces the built-in of the same name.
    pub fn new(options: DotpromptOptions) -> Result<Self> {
        debug!(
            helpers = options.helpers.len(),
            partials = options.partials.len(),
            tools = options.tools.len(),
            schemas = options.schemas.len(),
            "Dotprompt::new: called"
        );
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);

        let mut dotprompt = Self {
            handlebars,
            known_helpers: HashSet::new(),
            known_partials: HashSet::new(),
            resolver: MetadataResolver::new(
                options.default_model,
                options.model_configs,
                options.tool_resolver,
                options.schema_resolver,
            ),
            partial_resolver: options.partial_resolver,
        };

        for (name, helper) in options.helpers {
            dotprompt.define_helper(name, helper);
        }
        for (name, helper) in builtin_helpers() {
            dotprompt.define_helper(name, helper);
        }
        for (name, source) in &options.partials {
            dotprompt.define_partial(name, source)?;
        }
        for def in options.tools.into_values() {
            dotprompt.define_tool(def);
        }
        for (name, schema) in options.schemas {
            dotprompt.define_schema(name, schema);
        }

        Ok(dotprompt)
    }

    /// Register a helper; a name that is already registered is left alone
    pub fn define_helper(&mut self, name: impl Into<String>, helper: BoxedHelper) -> &mut Self {
        let name = name.into();
        if self.known_helpers.contains(&name) {
            debug!(%name, "Dotprompt::define_helper: already registered, skipping");
            return self;
        }
        debug!(%name, "Dotprompt::define_helper: registering");
        self.handlebars.register_helper(&name, helper);
        self.known_helpers.insert(name);
        self
    }

    /// Register a partial; a name that is already registered is left alone
    pub fn define_partial(&mut self, name: &str, source: &str) -> Result<&mut Self> {
        if self.known_partials.contains(name) {
            debug!(%name, "Dotprompt::define_partial: already registered, skipping");
            return Ok(self);
        }
        debug!(%name, source_len = source.len(), "Dotprompt::define_partial: registering");
        self.handlebars.register_partial(name, source)?;
        self.known_partials.insert(name.to_string());
        Ok(self)
    }

    /// Register a tool definition; last write wins
    pub fn define_tool(&mut self, def: ToolDefinition) -> &mut Self {
        self.resolver.define_tool(def);
        self
    }

    /// Register a named schema for Picoschema references; last write wins
    pub fn define_schema(&mut self, name: impl Into<String>, schema: JsonSchema) -> &mut Self {
        self.resolver.define_schema(name, schema);
        self
    }

    /// Split a document into metadata and template
    pub fn parse(&self, source: &str) -> ParsedPrompt {
        debug!(source_len = source.len(), "Dotprompt::parse: called");
        parse_document(source)
    }

    /// Resolve the metadata a render of `prompt` would carry
    pub fn render_metadata(&self, prompt: &ParsedPrompt, overrides: Option<&PromptMetadata>) -> Result<PromptMetadata> {
        debug!("Dotprompt::render_metadata: called");
        self.resolver.render_metadata(&prompt.metadata, overrides)
    }

    /// Compile a document into a reusable render function.
    ///
    /// `additional_metadata` is layered over the front matter. Partials the
    /// template references are resolved and registered before the template
    /// itself, so syntax errors in either surface here. The template is
    /// registered under a name derived from its body, so compiling the same
    /// source again reuses one registry entry.
    pub fn compile(&mut self, source: &str, additional_metadata: Option<&PromptMetadata>) -> Result<PromptFunction<'_>> {
        debug!(source_len = source.len(), "Dotprompt::compile: called");
        let mut prompt = self.parse(source);
        if let Some(additional) = additional_metadata {
            debug!("Dotprompt::compile: merging additional metadata");
            prompt.metadata.merge_from(additional);
        }

        self.resolve_partials(&prompt.template)?;

        let template_name = registry_name(&prompt.template);
        self.handlebars.register_template_string(&template_name, &prompt.template)?;
        info!(%template_name, name = ?prompt.metadata.name, "Compiled prompt template");

        Ok(PromptFunction {
            dotprompt: self,
            template_name,
            prompt,
        })
    }

    /// Compile and render in one step
    pub fn render(
        &mut self,
        source: &str,
        data: &DataArgument,
        options: Option<&PromptMetadata>,
    ) -> Result<RenderedPrompt> {
        debug!("Dotprompt::render: called");
        let func = self.compile(source, None)?;
        let template_name = func.template_name.clone();
        let result = func.render(data, options);

        self.handlebars.unregister_template(&template_name);
        debug!(%template_name, "Dotprompt::render: unregistered template");
        result
    }

    /// Register every partial the template references, depth-first.
    ///
    /// Names already known are skipped, which also stops reference cycles.
    /// A resolver with nothing for a name leaves it unregistered.
    fn resolve_partials(&mut self, template: &str) -> Result<()> {
        for name in identify_partials(template) {
            if self.known_partials.contains(&name) {
                continue;
            }
            let source = match &self.partial_resolver {
                Some(resolver) => resolver
                    .resolve_partial(&name)
                    .map_err(|e| DotpromptError::resolver("partial", &name, e))?,
                None => {
                    debug!("Dotprompt::resolve_partials: no partial resolver");
                    return Ok(());
                }
            };

            match source {
                Some(source) if !source.is_empty() => {
                    debug!(%name, "Dotprompt::resolve_partials: resolved partial");
                    self.define_partial(&name, &source)?;
                    self.resolve_partials(&source)?;
                }
                _ => debug!(%name, "Dotprompt::resolve_partials: partial left unresolved"),
            }
        }
        Ok(())
    }
}

fn registry_name(template: &str) -> String {
    let mut hasher = DefaultHasher::new();
    template.hash(&mut hasher);
    format!("__dotprompt_{:016x}", hasher.finish())
}

/// Names of the partials a template references, in order of first use
pub fn identify_partials(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PARTIAL_RE.captures_iter(template) {
        let Some(name) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        // Dynamic `{{> (lookup ...)}}` and `@partial-block` have no static name
        if name.starts_with('(') || name.starts_with('@') {
            continue;
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    debug!(?names, "identify_partials: found");
    names
}

/// A compiled prompt, bound to the `Dotprompt` that compiled it
pub struct PromptFunction<'a> {
    dotprompt: &'a Dotprompt,
    template_name: String,
    prompt: ParsedPrompt,
}

impl PromptFunction<'_> {
    /// The parsed document this function renders
    pub fn prompt(&self) -> &ParsedPrompt {
        &self.prompt
    }

    /// Render with `data`, layering `options` over the document's metadata.
    ///
    /// Template variables come from `input.default`, then `data.input`, then
    /// `data.context`; later sources win per key.
    pub fn render(&self, data: &DataArgument, options: Option<&PromptMetadata>) -> Result<RenderedPrompt> {
        debug!(template_name = %self.template_name, "PromptFunction::render: called");
        let metadata = self.dotprompt.render_metadata(&self.prompt, options)?;

        let mut context: Map<String, Value> = metadata.input.default.clone();
        context.extend(data.input.iter().map(|(k, v)| (k.clone(), v.clone())));
        context.extend(data.context.iter().map(|(k, v)| (k.clone(), v.clone())));

        let rendered = self
            .dotprompt
            .handlebars
            .render(&self.template_name, &Value::Object(context))?;
        let messages = to_messages(&rendered, Some(data))?;
        info!(messages = messages.len(), "Rendered prompt");

        Ok(RenderedPrompt { metadata, messages })
    }
}

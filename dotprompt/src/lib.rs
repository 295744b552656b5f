//! Dotprompt - executable prompt templates
//!
//! A `.prompt` file is YAML front matter (model, config, tools, input and
//! output schemas) followed by a Handlebars template. This crate compiles such
//! a document into role-tagged, multi-part chat messages plus fully resolved
//! metadata.
//!
//! ```no_run
//! use dotprompt::{DataArgument, Dotprompt, DotpromptOptions};
//!
//! let mut dp = Dotprompt::new(DotpromptOptions::default().with_default_model("gemini-pro"))?;
//! let source = "---\ninput:\n  schema:\n    name: string\n---\nHello {{name}}!";
//! let mut data = DataArgument::default();
//! data.input.insert("name".into(), "Ada".into());
//!
//! let rendered = dp.render(source, &data, None)?;
//! assert_eq!(rendered.messages[0].role, "user");
//! # Ok::<(), dotprompt::DotpromptError>(())
//! ```

pub mod cli;
pub mod config;
pub mod dotprompt;
pub mod error;
pub mod helpers;
pub mod loader;
pub mod parse;
pub mod picoschema;
pub mod resolve;
pub mod types;

pub use dotprompt::{Dotprompt, DotpromptOptions, PromptFunction, identify_partials};
pub use error::{BoxError, DotpromptError, Result};
pub use loader::PartialLoader;
pub use parse::{insert_history, parse_document, to_messages, to_parts};
pub use picoschema::{PicoschemaParser, SchemaResolver, picoschema};
pub use resolve::{MetadataResolver, PartialResolver, ToolResolver, resolve_metadata};
pub use types::{
    DataArgument, Document, JsonSchema, MediaContent, Message, Metadata, ParsedPrompt, Part, PromptInputConfig,
    PromptMetadata, PromptOutputConfig, RenderedPrompt, ToolDefinition, ToolRequest, ToolResponse,
};

//! Dotprompt error types

use thiserror::Error;

/// Error type returned by caller-supplied resolvers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the library
pub type Result<T, E = DotpromptError> = std::result::Result<T, E>;

/// Errors that can occur while compiling or rendering a prompt
#[derive(Debug, Error)]
pub enum DotpromptError {
    #[error("Picoschema: unsupported scalar type '{name}'")]
    UnsupportedType { name: String },

    #[error("Picoschema: could not find schema with name '{name}'")]
    SchemaNotFound { name: String },

    #[error("Picoschema: parenthetical types must be 'object', 'array' or 'enum', got: {kind}")]
    InvalidParenthetical { kind: String },

    #[error("Picoschema: {0}")]
    InvalidSchema(String),

    #[error("Dotprompt: Unable to resolve tool '{name}' to a recognized tool definition")]
    ToolNotFound { name: String },

    #[error("Invalid marker: {0}")]
    InvalidMarker(String),

    #[error("{kind} resolver failed for '{name}': {source}")]
    Resolver {
        kind: &'static str,
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("Render error: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DotpromptError {
    /// Wrap an error returned by a resolver callback
    pub fn resolver(kind: &'static str, name: &str, source: BoxError) -> Self {
        Self::Resolver {
            kind,
            name: name.to_string(),
            source,
        }
    }
}

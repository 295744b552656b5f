//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

/// dp - compile and render dotprompt files
#[derive(Parser)]
#[command(
    name = "dp",
    about = "Compile, inspect and render .prompt files",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render a prompt file into messages
    Render {
        /// Prompt file to render
        file: PathBuf,

        /// Input data as JSON, or @path to a JSON file
        #[arg(short, long)]
        data: Option<String>,

        /// Model override
        #[arg(short, long)]
        model: Option<String>,

        /// Extra directory to search for partials (repeatable)
        #[arg(short, long = "partials")]
        partials: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// Parse a prompt file and print its metadata and template
    Parse {
        /// Prompt file to parse
        file: PathBuf,
    },

    /// Compile a Picoschema file (YAML or JSON) to JSON Schema
    Schema {
        /// Schema file to compile
        file: PathBuf,
    },
}

/// Output format for rendered prompts
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "json" => {
                debug!("OutputFormat::from_str: matched Json");
                Ok(Self::Json)
            }
            "yaml" | "yml" => {
                debug!("OutputFormat::from_str: matched Yaml");
                Ok(Self::Yaml)
            }
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: json or yaml", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

/// Path of the dp log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dotprompt")
        .join("logs")
        .join("dp.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("YAML".parse::<OutputFormat>(), Ok(OutputFormat::Yaml));
        assert_eq!("yml".parse::<OutputFormat>(), Ok(OutputFormat::Yaml));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_render_args() {
        let cli = Cli::try_parse_from([
            "dp",
            "render",
            "greet.prompt",
            "--data",
            r#"{"name":"Ada"}"#,
            "-p",
            "a",
            "-p",
            "b",
            "--format",
            "yaml",
        ])
        .unwrap();

        match cli.command {
            Command::Render {
                file,
                data,
                partials,
                format,
                model,
            } => {
                assert_eq!(file, PathBuf::from("greet.prompt"));
                assert_eq!(data.as_deref(), Some(r#"{"name":"Ada"}"#));
                assert_eq!(partials, vec![PathBuf::from("a"), PathBuf::from("b")]);
                assert_eq!(format, OutputFormat::Yaml);
                assert!(model.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_log_level() {
        let cli = Cli::try_parse_from(["dp", "parse", "x.prompt", "-l", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}

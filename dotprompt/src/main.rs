//! dp - dotprompt command line
//!
//! CLI entry point for rendering, parsing and schema-compiling prompt files.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use serde::Serialize;
use tracing::{debug, info};

use dotprompt::cli::{Cli, Command, OutputFormat, get_log_path};
use dotprompt::config::Config;
use dotprompt::{BoxError, DataArgument, Dotprompt, JsonSchema, PromptMetadata, picoschema};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(default_model = ?config.default_model, "dp loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Render {
            file,
            data,
            model,
            partials,
            format,
        } => {
            debug!(?file, ?model, ?format, "main: matched Render command");
            cmd_render(&config, &file, data.as_deref(), model, &partials, format)
        }
        Command::Parse { file } => {
            debug!(?file, "main: matched Parse command");
            cmd_parse(&file)
        }
        Command::Schema { file } => {
            debug!(?file, "main: matched Schema command");
            cmd_schema(&config, &file)
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).context(format!("Failed to read {}", path.display()))
}

/// `--data` is inline JSON, or `@path` to a JSON file
fn load_data(data: Option<&str>) -> Result<DataArgument> {
    let Some(data) = data else {
        debug!("load_data: no data given");
        return Ok(DataArgument::default());
    };
    let json = match data.strip_prefix('@') {
        Some(path) => read_source(Path::new(path))?,
        None => data.to_string(),
    };
    serde_json::from_str(&json).context("Failed to parse --data as JSON")
}

fn print_output<T: Serialize>(value: &T, format: &OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

/// Render a prompt file into messages
fn cmd_render(
    config: &Config,
    file: &Path,
    data: Option<&str>,
    model: Option<String>,
    partials: &[PathBuf],
    format: OutputFormat,
) -> Result<()> {
    debug!(?file, "cmd_render: called");
    let source = read_source(file)?;
    let data = load_data(data)?;

    // The prompt's own directory is searched for partials last
    let mut partials_dirs = partials.to_vec();
    partials_dirs.extend(config.partials_dirs.iter().cloned());
    if let Some(parent) = file.parent() {
        partials_dirs.push(parent.to_path_buf());
    }
    let options = Config {
        partials_dirs,
        ..config.clone()
    }
    .dotprompt_options(&[]);

    let mut dotprompt = Dotprompt::new(options)?;
    let overrides = model.map(|model| PromptMetadata {
        model: Some(model),
        ..Default::default()
    });

    let rendered = dotprompt
        .render(&source, &data, overrides.as_ref())
        .map_err(|e| eyre!("Failed to render {}: {}", file.display(), e))?;
    info!(messages = rendered.messages.len(), "cmd_render: rendered");

    print_output(&rendered, &format)?;
    eprintln!(
        "{} Rendered {} message(s) from {}",
        "✓".green(),
        rendered.messages.len(),
        file.display().to_string().cyan()
    );
    Ok(())
}

/// Print the parsed metadata and template of a prompt file
fn cmd_parse(file: &Path) -> Result<()> {
    debug!(?file, "cmd_parse: called");
    let source = read_source(file)?;
    let dotprompt = Dotprompt::new(Default::default())?;
    print_output(&dotprompt.parse(&source), &OutputFormat::Json)
}

/// Compile a Picoschema file, resolving names against configured schemas
fn cmd_schema(config: &Config, file: &Path) -> Result<()> {
    debug!(?file, "cmd_schema: called");
    let source = read_source(file)?;
    let schema: serde_json::Value = serde_yaml::from_str(&source).context("Failed to parse schema file")?;

    let schemas = config.schemas.clone();
    let resolver =
        move |name: &str| -> std::result::Result<Option<JsonSchema>, BoxError> { Ok(schemas.get(name).cloned()) };

    match picoschema(Some(&schema), Some(&resolver)).map_err(|e| eyre!("{}: {}", file.display(), e))? {
        Some(compiled) => print_output(&compiled, &OutputFormat::Json),
        None => {
            println!("null");
            Ok(())
        }
    }
}

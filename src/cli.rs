//! The `qweb` command line tool.

use clap::{Parser, Subcommand};
use log::{debug, info};
use qweb_engine::{EngineConfig, QWeb, QWebError, RenderOptions};
use qweb_expr::Values;
use qweb_traits::{InMemoryTemplateStore, LoadError, TemplateRef};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("No template named '{0}' in the document")]
    UnknownTemplate(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Render(#[from] QWebError),
}

#[derive(Parser, Debug)]
#[command(name = "qweb", version, about = "Render QWeb XML templates")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render one template of a templates document to stdout.
    Render(RenderArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct RenderArgs {
    /// XML document holding one or more `t-name` templates.
    pub templates: PathBuf,

    /// Name of the template to render.
    pub name: String,

    /// JSON object used as the render values.
    #[arg(long)]
    pub values: Option<PathBuf>,

    /// Language code passed in the render options.
    #[arg(long)]
    pub lang: Option<String>,

    /// Engine configuration (JSON).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Reject unsafe expression constructs at compile time.
    #[arg(long)]
    pub sandboxed: bool,

    /// Use the interpretive renderer instead of compiling.
    #[arg(long)]
    pub interpret: bool,

    /// Enable `t-debug` and debug asset output.
    #[arg(long)]
    pub dev: bool,
}

pub fn run(cli: Cli) -> Result<String, CliError> {
    match cli.command {
        Command::Render(args) => render(&args),
    }
}

pub fn render(args: &RenderArgs) -> Result<String, CliError> {
    let document = read(&args.templates)?;
    let store = Arc::new(InMemoryTemplateStore::new());
    let names = store.add_document(&document)?;
    info!(
        "Loaded {} templates from {}",
        names.len(),
        args.templates.display()
    );
    if !names.iter().any(|name| name == &args.name) {
        return Err(CliError::UnknownTemplate(args.name.clone()));
    }

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_str(&read(path)?).map_err(|source| {
            CliError::Json {
                path: path.clone(),
                source,
            }
        })?,
        None => EngineConfig::default(),
    };
    config.sandboxed |= args.sandboxed;
    let engine = QWeb::builder(store).with_config(config).build();

    let mut values = match &args.values {
        Some(path) => {
            let json = serde_json::from_str(&read(path)?).map_err(|source| CliError::Json {
                path: path.clone(),
                source,
            })?;
            Values::from_json(json)
        }
        None => Values::new(),
    };
    if args.dev {
        values.set("debug", true);
    }
    let options = RenderOptions {
        lang: args.lang.clone(),
        dev_mode: args.dev,
        ..RenderOptions::default()
    };

    let template = TemplateRef::from(args.name.as_str());
    debug!(
        "Rendering '{}' ({})",
        template,
        if args.interpret { "interpreted" } else { "compiled" }
    );
    let output = if args.interpret {
        engine.render_interpreted(&template, values, &options, None)?
    } else {
        engine.render(&template, values, &options)?
    };
    Ok(output)
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

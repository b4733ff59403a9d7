//! catalog-schema - replay schema editor scripts against the core editor

mod config;
mod error;
mod script;

use anyhow::{Context, Result};
use catalog_schema_core::{Editor, Settings};
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "catalog-schema")]
#[command(
    version,
    about = "Design material catalog schemas with derived-column formulas"
)]
struct Cli {
    /// Editor script to run (default: stdin)
    script: Option<PathBuf>,

    /// Run a single script line (can be repeated)
    #[arg(short = 'c', long = "command")]
    commands: Vec<String>,

    /// Load settings from this TOML file instead of the user config dir
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ignore config files and use the default settings
    #[arg(long, conflicts_with = "config")]
    no_config: bool,

    /// Also write the last submitted payload to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print submitted JSON
    #[arg(long)]
    pretty: bool,

    /// Log editor transitions to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_source(cli: &Cli) -> Result<String> {
    if !cli.commands.is_empty() {
        return Ok(cli.commands.join("\n"));
    }
    match &cli.script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("Failed to read script from stdin")?;
            Ok(source)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let settings = if cli.no_config {
        Settings::default()
    } else {
        let (settings, warnings) = config::load_settings(cli.config.as_deref());
        for warning in warnings {
            eprintln!("Warning: {}", warning);
        }
        settings
    };

    let source = read_source(cli)?;
    let mut session = script::Session::new(Editor::new(settings), cli.pretty);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = session.run(&source, &mut out);
    out.flush()?;
    result?;

    if let Some(path) = &cli.output {
        let json = session
            .last_submission()
            .context("No schema was submitted, nothing to write")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(&cli) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

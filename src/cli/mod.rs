//! The BPMN-Lite Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions.

use std::{fs, path::Path, process};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    cli::{
        args::{BplArgs, Command},
        output::{CheckSummary, FileStatus},
    },
    config::{CompileOptions, Direction},
    discovery::SourceDiscoverer,
    engine::{compile_with, parse_with, print_error, read_source, source_name},
    err_msg, BplError,
};

pub mod args;
pub mod output;

// ============================================================================
// MAIN ENTRY POINT
// ============================================================================

/// The main entry point for the CLI.
pub fn run() {
    let args = BplArgs::parse();
    init_tracing(args.verbose);

    let result = match args.command {
        Command::Render {
            file,
            output,
            direction,
            no_styles,
            config,
        } => handle_render(&file, output.as_deref(), direction, no_styles, config.as_deref()),
        Command::Ast {
            file,
            compact,
            config,
        } => handle_ast(&file, compact, config.as_deref()),
        Command::Check {
            path,
            deny_warnings,
            config,
        } => handle_check(&path, deny_warnings, config.as_deref()),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            print_error(e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "error",
        1 => "debug",
        _ => "trace",
    };
    // A subscriber may already be installed when the CLI is driven from tests.
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init();
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

fn handle_render(
    file: &Path,
    out_path: Option<&Path>,
    direction: Option<Direction>,
    no_styles: bool,
    config: Option<&Path>,
) -> Result<bool, BplError> {
    let mut options = load_options(config)?;
    if let Some(direction) = direction {
        options.render.direction = direction;
    }
    if no_styles {
        options.render.styles = false;
    }

    let (name, text) = read_named(file)?;
    let compiled = compile_with(&text, &options).map_err(|e| e.with_named_source(&name, &text))?;
    output::print_diagnostics(&name, &text, &compiled.result.diagnostics);

    match out_path {
        Some(path) => {
            fs::write(path, &compiled.diagram).map_err(|e| {
                err_msg!(Io, "cannot write {}: {}", path.display(), e).caused_by(e)
            })?;
            info!(output = %path.display(), "wrote diagram");
        }
        None => print!("{}", compiled.diagram),
    }
    Ok(true)
}

fn handle_ast(file: &Path, compact: bool, config: Option<&Path>) -> Result<bool, BplError> {
    let options = load_options(config)?;
    let (name, text) = read_named(file)?;
    let result = parse_with(&text, &options.parse).map_err(|e| e.with_named_source(&name, &text))?;

    let json = if compact {
        serde_json::to_string(&result)
    } else {
        serde_json::to_string_pretty(&result)
    }
    .map_err(|e| err_msg!(Serialize, "cannot serialize {}: {}", name, e).caused_by(e))?;
    println!("{json}");
    Ok(true)
}

fn handle_check(path: &Path, deny_warnings: bool, config: Option<&Path>) -> Result<bool, BplError> {
    let options = load_options(config)?;
    let files = SourceDiscoverer::discover_files(path)?;
    debug!(files = files.len(), root = %path.display(), "discovered sources");

    let mut summary = CheckSummary {
        files: files.len(),
        ..CheckSummary::default()
    };
    for file in &files {
        let status = check_file(file, &options);
        match status {
            FileStatus::Clean => summary.clean += 1,
            FileStatus::Warnings(n) => summary.warnings += n,
            FileStatus::Failed => summary.failed += 1,
        }
        output::print_file_status(file, status);
    }

    output::print_check_summary(&summary);
    Ok(summary.passed(deny_warnings))
}

fn check_file(file: &Path, options: &CompileOptions) -> FileStatus {
    let (name, text) = match read_named(file) {
        Ok(source) => source,
        Err(e) => {
            print_error(e);
            return FileStatus::Failed;
        }
    };
    match parse_with(&text, &options.parse) {
        Ok(result) if result.diagnostics.is_empty() => FileStatus::Clean,
        Ok(result) => {
            output::print_diagnostics(&name, &text, &result.diagnostics);
            FileStatus::Warnings(result.diagnostics.len())
        }
        Err(e) => {
            print_error(e.with_named_source(&name, &text));
            FileStatus::Failed
        }
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn load_options(config: Option<&Path>) -> Result<CompileOptions, BplError> {
    match config {
        Some(path) => CompileOptions::load(path),
        None => Ok(CompileOptions::default()),
    }
}

fn read_named(file: &Path) -> Result<(String, String), BplError> {
    let text = read_source(file)?;
    Ok((source_name(file), text))
}

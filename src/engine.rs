//! Compilation pipeline
//!
//! Wires the stages together: classify and parse, infer flow, render. Every call builds
//! its own state; nothing is shared between calls.

use std::{fs, path::Path};

use miette::Report;
use tracing::debug;

use crate::ast::{Connection, Document, ParseResult};
use crate::config::{CompileOptions, ParseOptions, RenderOptions};
use crate::inference::infer;
use crate::syntax::DocumentParser;
use crate::transpile::MermaidTranspiler;
use crate::{err_msg, BplError};

/// A parse result together with its rendered diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
    pub result: ParseResult,
    pub diagram: String,
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Parses a document with default options.
pub fn parse(text: &str) -> Result<ParseResult, BplError> {
    parse_with(text, &ParseOptions::default())
}

pub fn parse_with(text: &str, options: &ParseOptions) -> Result<ParseResult, BplError> {
    let parsed = DocumentParser::new(options).parse(text)?;
    Ok(infer(parsed))
}

/// Renders a document and its connections with default options.
pub fn render(document: &Document, connections: &[Connection]) -> String {
    render_with(document, connections, &RenderOptions::default())
}

pub fn render_with(
    document: &Document,
    connections: &[Connection],
    options: &RenderOptions,
) -> String {
    MermaidTranspiler::new(options).render(document, connections)
}

/// Parses and renders in one call.
pub fn compile(text: &str) -> Result<Compiled, BplError> {
    compile_with(text, &CompileOptions::default())
}

pub fn compile_with(text: &str, options: &CompileOptions) -> Result<Compiled, BplError> {
    let result = parse_with(text, &options.parse)?;
    let diagram = render_with(&result.document, &result.connections, &options.render);
    debug!(
        diagnostics = result.diagnostics.len(),
        bytes = diagram.len(),
        "compiled document"
    );
    Ok(Compiled { result, diagram })
}

// ============================================================================
// SOURCES
// ============================================================================

/// Reads a source file, or standard input when `path` is `-`.
pub fn read_source(path: &Path) -> Result<String, BplError> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut text)
            .map_err(|e| err_msg!(Io, "cannot read standard input: {}", e).caused_by(e))?;
        return Ok(text);
    }
    fs::read_to_string(path)
        .map_err(|e| err_msg!(Io, "cannot read {}: {}", path.display(), e).caused_by(e))
}

/// Display name for a source path in reports.
pub fn source_name(path: &Path) -> String {
    if path == Path::new("-") {
        "<stdin>".to_string()
    } else {
        path.display().to_string()
    }
}

/// Prints a fatal error as a graphical report on stderr.
pub fn print_error(error: BplError) {
    let report = Report::new(error);
    eprintln!("{report:?}");
}

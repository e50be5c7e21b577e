//! BPMN-Lite compiler
//!
//! Compiles an indentation-based plain-text process notation into a process graph
//! (lanes, elements, connections) and renders it as a Mermaid flowchart.
//!
//! ```
//! let compiled = bpmn_lite::compile("@Customer\nplace order\n@Shop\nship").unwrap();
//! assert_eq!(compiled.result.connections.len(), 1);
//! assert!(compiled.diagram.starts_with("flowchart TD"));
//! ```

pub use crate::ast::{
    Branch, BranchSign, Connection, ConnectionKind, Document, Element, ElementKind, Lane,
    ParseResult,
};
pub use crate::config::{CompileOptions, Direction, ParseOptions, RenderOptions};
pub use crate::diagnostics::{
    to_error_source, BplError, DiagnosticKind, ErrorContext, ErrorType, ParseDiagnostic,
    SourceArc,
};
pub use crate::engine::{
    compile, compile_with, parse, parse_with, render, render_with, Compiled,
};

pub mod ast;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod engine;
pub mod inference;
pub mod syntax;
pub mod transpile;

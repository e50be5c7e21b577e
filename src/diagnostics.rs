//!
//! ****************************************************************************************
//! ** ERROR CONSTRUCTION RULES FOR BPMN-Lite (`err_msg!`, `err_ctx!`)                      **
//! ****************************************************************************************
//!
//! # Overview
//!
//! This module defines the `miette`-based diagnostic system of the compiler. There are two
//! families of problems:
//!
//! - **Fatal errors** (`BplError`) abort a pipeline call. Only structural corruption of the
//!   document and failures of the surrounding tooling (I/O, configuration, serialization)
//!   are fatal.
//! - **Recoverable diagnostics** (`ParseDiagnostic`) are collected into the parse result and
//!   never raised. A partially well-formed document still renders.
//!
//! # Error Construction Macros
//!
//! - **Use `err_msg!` for message-only errors.**
//!   - `err_msg!(Io, "cannot read {}", path.display())`
//!
//! - **Use `err_ctx!` when a source and span are at hand.**
//!   - `err_ctx!(StructuralCorruption, "indentation too deep", src, span)`
//!   - `err_ctx!(StructuralCorruption, "indentation too deep", src, span, help)`
//!
//! # Rules
//!
//! - Never build an `ErrorContext` by hand when a macro arm fits.
//! - Pass `src` as a `&SourceArc`; the macro clones the `Arc`.
//! - Always pass a `Span`, never a raw offset.
//!
//! ****************************************************************************************

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, Severity, SourceCode};
use serde::Serialize;
use thiserror::Error;

use crate::syntax::Span;

// Type aliases for clarity and brevity
pub type SourceArc = Arc<NamedSource<String>>;
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Type-safe classification of fatal errors, used by the CLI and by test assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// The indentation/lane structure of the document cannot be recovered.
    Structural,
    /// Reading input or writing output failed.
    Io,
    /// A configuration file could not be loaded.
    Config,
    /// The result could not be serialized.
    Serialize,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Structural => "Structural",
            ErrorType::Io => "Io",
            ErrorType::Config => "Config",
            ErrorType::Serialize => "Serialize",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default)]
pub struct ErrorContext {
    /// The source document this error points into (if any).
    pub source: Option<SourceArc>,
    /// The primary span (if any).
    pub span: Option<Span>,
    /// 1-based line number of the offending line (if any).
    pub line: Option<usize>,
    /// An optional help message.
    pub help: Option<String>,
}

impl ErrorContext {
    /// Returns an empty error context.
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a context with source and span.
    pub fn with_source_and_span(source: SourceArc, span: Span) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            ..Self::default()
        }
    }
}

/// Fatal failure of a pipeline call.
#[derive(Debug, Error)]
pub enum BplError {
    #[error("Structural corruption: {message}")]
    StructuralCorruption {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("I/O error: {message}")]
    Io {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
    #[error("Serialization error: {message}")]
    Serialize {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxedCause>,
    },
}

impl BplError {
    fn get_ctx(&self) -> &ErrorContext {
        match self {
            BplError::StructuralCorruption { ctx, .. } => ctx,
            BplError::Io { ctx, .. } => ctx,
            BplError::Config { ctx, .. } => ctx,
            BplError::Serialize { ctx, .. } => ctx,
        }
    }

    fn get_ctx_mut(&mut self) -> &mut ErrorContext {
        match self {
            BplError::StructuralCorruption { ctx, .. } => ctx,
            BplError::Io { ctx, .. } => ctx,
            BplError::Config { ctx, .. } => ctx,
            BplError::Serialize { ctx, .. } => ctx,
        }
    }

    fn message(&self) -> &str {
        match self {
            BplError::StructuralCorruption { message, .. }
            | BplError::Io { message, .. }
            | BplError::Config { message, .. }
            | BplError::Serialize { message, .. } => message,
        }
    }

    /// Returns the type-safe classification of this error.
    pub fn error_type(&self) -> ErrorType {
        match self {
            BplError::StructuralCorruption { .. } => ErrorType::Structural,
            BplError::Io { .. } => ErrorType::Io,
            BplError::Config { .. } => ErrorType::Config,
            BplError::Serialize { .. } => ErrorType::Serialize,
        }
    }

    /// The offending line, when the error points at one.
    pub fn line(&self) -> Option<usize> {
        self.get_ctx().line
    }

    /// Records the offending line.
    pub fn at_line(mut self, line: usize) -> Self {
        self.get_ctx_mut().line = Some(line);
        self
    }

    /// Records the offending span. It is only labelled once a source is attached.
    pub fn at_span(mut self, span: Span) -> Self {
        self.get_ctx_mut().span = Some(span);
        self
    }

    /// Attaches a cause.
    pub fn caused_by(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        match &mut self {
            BplError::StructuralCorruption { source, .. }
            | BplError::Io { source, .. }
            | BplError::Config { source, .. }
            | BplError::Serialize { source, .. } => *source = Some(Box::new(cause)),
        }
        self
    }

    /// Replaces the anonymous source with a named one so reports show the file name.
    pub fn with_named_source(mut self, name: &str, text: &str) -> Self {
        self.get_ctx_mut().source = Some(Arc::new(NamedSource::new(name, text.to_string())));
        self
    }
}

impl Diagnostic for BplError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match self.error_type() {
            ErrorType::Structural => "bpmn_lite::structural_corruption",
            ErrorType::Io => "bpmn_lite::io",
            ErrorType::Config => "bpmn_lite::config",
            ErrorType::Serialize => "bpmn_lite::serialize",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.get_ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.get_ctx()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.get_ctx();
        // Labels without source code cannot be rendered.
        ctx.source.as_ref()?;
        let span = ctx.span?;
        let label = LabeledSpan::new(Some(self.message().to_string()), span.start, span.len());
        Some(Box::new(std::iter::once(label)))
    }
}

/// Converts a source string into an `Arc<NamedSource<String>>` for use in error contexts.
pub fn to_error_source<S: AsRef<str>>(source: S) -> SourceArc {
    Arc::new(NamedSource::new("source", source.as_ref().to_string()))
}

/// Constructs a `BplError` variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $($arg:tt)+) => {
        $crate::BplError::$variant {
            message: format!($($arg)+),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a `BplError` variant with a message, a source, a span and an optional help text.
#[macro_export]
macro_rules! err_ctx {
    // Message, src, span, help
    ($variant:ident, $msg:expr, $src:expr, $span:expr, $help:expr) => {
        $crate::BplError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext {
                source: Some($crate::diagnostics::SourceArc::clone($src)),
                span: Some($span),
                line: None,
                help: Some(format!("{}", $help)),
            },
            source: None,
        }
    };
    // Message, src, span
    ($variant:ident, $msg:expr, $src:expr, $span:expr) => {
        $crate::BplError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_source_and_span(
                $crate::diagnostics::SourceArc::clone($src),
                $span,
            ),
            source: None,
        }
    };
}

// ============================================================================
// RECOVERABLE DIAGNOSTICS
// ============================================================================

/// Classification of the non-fatal problems the compiler recovers from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    /// Leading whitespace that does not fit the document's indentation unit.
    MalformedIndentation,
    /// A leading punctuation character that is not a known sigil.
    UnknownSigil,
    /// An inline arrow or explicit connection whose endpoint never appears.
    UnresolvedForwardReference,
    /// A send or receive that never found its counterpart.
    UnmatchedMessage,
    /// The same label declared twice in one lane.
    DuplicateLabel,
    /// A branch line with no open gateway above it.
    OrphanBranch,
    /// A `^` line that is not of the form `Label @A.x -> @B.y`.
    MalformedConnection,
    /// A data object whose task label matches nothing.
    UnresolvedDataAssociation,
    /// A sigil with nothing after it.
    EmptyPayload,
    /// A second process name line.
    RedefinedProcess,
}

impl DiagnosticKind {
    /// Diagnostic code shown in reports.
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::MalformedIndentation => "bpmn_lite::malformed_indentation",
            DiagnosticKind::UnknownSigil => "bpmn_lite::unknown_sigil",
            DiagnosticKind::UnresolvedForwardReference => "bpmn_lite::unresolved_reference",
            DiagnosticKind::UnmatchedMessage => "bpmn_lite::unmatched_message",
            DiagnosticKind::DuplicateLabel => "bpmn_lite::duplicate_label",
            DiagnosticKind::OrphanBranch => "bpmn_lite::orphan_branch",
            DiagnosticKind::MalformedConnection => "bpmn_lite::malformed_connection",
            DiagnosticKind::UnresolvedDataAssociation => "bpmn_lite::unresolved_data",
            DiagnosticKind::EmptyPayload => "bpmn_lite::empty_payload",
            DiagnosticKind::RedefinedProcess => "bpmn_lite::redefined_process",
        }
    }
}

/// A recoverable problem found while compiling a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct ParseDiagnostic {
    pub kind: DiagnosticKind,
    /// 1-based line number.
    pub line: usize,
    pub span: Span,
    pub message: String,
}

impl ParseDiagnostic {
    pub fn new(kind: DiagnosticKind, line: usize, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            span,
            message: message.into(),
        }
    }
}

impl Diagnostic for ParseDiagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Warning)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = LabeledSpan::new(Some(self.message.clone()), self.span.start, self.span.len());
        Some(Box::new(std::iter::once(label)))
    }
}

#[cfg(test)]
mod diagnostics_tests {
    use miette::{GraphicalReportHandler, GraphicalTheme, Report};

    use super::*;

    fn render(diagnostic: &dyn Diagnostic) -> String {
        let mut out = String::new();
        GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
            .render_report(&mut out, diagnostic)
            .unwrap();
        out
    }

    #[test]
    fn test_structural_error_reports_help_and_label() {
        let src = to_error_source("@Lane\n  task\n");
        let err = err_ctx!(
            StructuralCorruption,
            "indentation too deep",
            &src,
            Span { start: 6, end: 12 },
            "flatten the nesting"
        )
        .at_line(2);
        assert_eq!(err.error_type(), ErrorType::Structural);
        assert_eq!(err.line(), Some(2));
        let output = render(&err);
        assert!(output.contains("indentation too deep"));
        assert!(output.contains("flatten the nesting"));
        assert!(output.contains("bpmn_lite::structural_corruption"));
    }

    #[test]
    fn test_err_msg_formats_arguments() {
        let err = err_msg!(Io, "cannot read {}: {}", "a.bpl", "missing");
        assert_eq!(err.to_string(), "I/O error: cannot read a.bpl: missing");
        assert!(err.labels().is_none());
    }

    #[test]
    fn test_parse_diagnostic_is_a_warning() {
        let diag = ParseDiagnostic::new(
            DiagnosticKind::UnknownSigil,
            1,
            Span { start: 0, end: 4 },
            "unknown sigil `$`",
        );
        assert_eq!(diag.severity(), Some(Severity::Warning));
        let report = Report::new(diag).with_source_code(NamedSource::new("doc.bpl", "$abc".to_string()));
        let output = format!("{report:?}");
        assert!(output.contains("unknown sigil"));
        assert!(output.contains("bpmn_lite::unknown_sigil"));
    }
}

// tests/diagnostic_tests.rs
//
// Recoverable diagnostics and fatal errors as seen through the public API.

mod common;

use bpmn_lite::{parse_with, DiagnosticKind, ErrorType, ParseOptions};
use common::*;
use miette::{Diagnostic, NamedSource, Report, Severity};

#[test]
fn test_every_recoverable_kind_is_reported() {
    let text = "\
:Process
:Again
@A
  task
   odd
$money
check
check
-orphan
^nothing here
#Ledger ghost
send: Ping
ref -> nowhere
?
";
    let result = parse_ok(text);
    let kinds = diagnostic_kinds(&result);
    for expected in [
        DiagnosticKind::RedefinedProcess,
        DiagnosticKind::MalformedIndentation,
        DiagnosticKind::UnknownSigil,
        DiagnosticKind::DuplicateLabel,
        DiagnosticKind::OrphanBranch,
        DiagnosticKind::MalformedConnection,
        DiagnosticKind::UnresolvedDataAssociation,
        DiagnosticKind::UnmatchedMessage,
        DiagnosticKind::UnresolvedForwardReference,
        DiagnosticKind::EmptyPayload,
    ] {
        assert!(kinds.contains(&expected), "missing {expected:?} in {kinds:?}");
    }
    // Partially broken documents still produce a graph.
    assert!(!result.connections.is_empty());
    assert_no_dangling_edges(&result);
}

#[test]
fn test_diagnostics_are_ordered_by_line() {
    let result = parse_ok("@A\nsend: Lost\nx -> missing\n#Doc ghost\n$y");
    let lines: Vec<_> = result.diagnostics.iter().map(|d| d.line).collect();
    let mut sorted = lines.clone();
    sorted.sort();
    assert_eq!(lines, sorted);
}

#[test]
fn test_diagnostic_span_points_at_line() {
    let text = "@A\n  $odd";
    let result = parse_ok(text);
    let diagnostic = &result.diagnostics[0];
    assert_eq!(diagnostic.line, 2);
    assert_eq!(&text[diagnostic.span.start..diagnostic.span.end], "$odd");
    assert_eq!(diagnostic.severity(), Some(Severity::Warning));
}

#[test]
fn test_diagnostic_report_names_the_file() {
    let text = "@A\n+stray";
    let result = parse_ok(text);
    let report = Report::new(result.diagnostics[0].clone())
        .with_source_code(NamedSource::new("orders.bpl", text.to_string()));
    let rendered = format!("{report:?}");
    assert!(rendered.contains("orders.bpl"));
    assert!(rendered.contains("bpmn_lite::orphan_branch"));
}

#[test]
fn test_excessive_nesting_is_structural_corruption() {
    let options = ParseOptions {
        max_depth: 2,
        ..ParseOptions::default()
    };
    let text = "@A\n a\n  b\n   c";
    let err = parse_with(text, &options).unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Structural);
    assert_eq!(err.line(), Some(4));

    let rendered = format!("{:?}", Report::new(err.with_named_source("deep.bpl", text)));
    assert!(rendered.contains("bpmn_lite::structural_corruption"));
    assert!(rendered.contains("deep.bpl"));
}

#[test]
fn test_arbitrary_text_never_fails() {
    for text in [
        "",
        "\n\n\n",
        "---\n---",
        "@\n:\n\"\n^\n!",
        "\t\ttabs first\n  then spaces",
        "ünïcödé → arrows <- everywhere -> ∞",
        "+|unterminated label",
    ] {
        let result = bpmn_lite::compile(text).unwrap();
        assert_no_dangling_edges(&result.result);
    }
}

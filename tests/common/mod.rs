// Shared helpers for the integration tests.
#![allow(dead_code)]

use bpmn_lite::{ConnectionKind, DiagnosticKind, ParseResult};

pub fn parse_ok(text: &str) -> ParseResult {
    bpmn_lite::parse(text).unwrap()
}

/// `(source, target)` of every connection of `kind`, in output order.
pub fn edges_of(result: &ParseResult, kind: ConnectionKind) -> Vec<(String, String)> {
    result
        .connections
        .iter()
        .filter(|c| c.kind == kind)
        .map(|c| (c.source_ref.clone(), c.target_ref.clone()))
        .collect()
}

pub fn sequence(result: &ParseResult) -> Vec<(String, String)> {
    edges_of(result, ConnectionKind::SequenceFlow)
}

pub fn edge(source: &str, target: &str) -> (String, String) {
    (source.to_string(), target.to_string())
}

pub fn diagnostic_kinds(result: &ParseResult) -> Vec<DiagnosticKind> {
    result.diagnostics.iter().map(|d| d.kind).collect()
}

/// Every connection endpoint names an element of the document.
pub fn assert_no_dangling_edges(result: &ParseResult) {
    for connection in &result.connections {
        assert!(
            result.document.element(&connection.source_ref).is_some(),
            "dangling source {}",
            connection.source_ref
        );
        assert!(
            result.document.element(&connection.target_ref).is_some(),
            "dangling target {}",
            connection.target_ref
        );
    }
}

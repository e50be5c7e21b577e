//! Flow inference
//!
//! Synthesizes the connection set from the parser's event log. The first pass walks the
//! log in order, keeping one open thread per lane plus a global cursor; the second pass
//! resolves data associations and deferred references against the finished document.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};

use crate::ast::{Connection, ConnectionKind, Document, Element, ElementKind, ParseResult};
use crate::diagnostics::{DiagnosticKind, ParseDiagnostic};
use crate::syntax::{slugify, DeferredRef, FlowEvent, ParsedDocument, RefEndpoint, Span};

/// An edge before its final id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edge {
    kind: ConnectionKind,
    source: String,
    target: String,
    label: Option<String>,
}

/// Connection synthesis over one parsed document.
pub struct FlowInference<'a> {
    document: &'a Document,
    by_id: HashMap<&'a str, &'a Element>,
    threads: HashMap<&'a str, &'a str>,
    cursor: Option<&'a str>,
    edges: Vec<Edge>,
    seen: HashSet<(ConnectionKind, String, String)>,
    diagnostics: Vec<ParseDiagnostic>,
}

impl<'a> FlowInference<'a> {
    pub fn new(document: &'a Document) -> Self {
        let by_id = document
            .lanes
            .iter()
            .flat_map(|l| &l.elements)
            .map(|e| (e.id.as_str(), e))
            .collect();
        Self {
            document,
            by_id,
            threads: HashMap::new(),
            cursor: None,
            edges: Vec::new(),
            seen: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Runs both passes and returns the numbered connections with the diagnostics
    /// raised along the way.
    pub fn run(
        mut self,
        events: &[FlowEvent],
        references: &[DeferredRef],
    ) -> (Vec<Connection>, Vec<ParseDiagnostic>) {
        for event in events {
            self.apply(event);
        }
        self.associate_data();
        for reference in references {
            self.resolve_reference(reference);
        }

        let connections: Vec<Connection> = self
            .edges
            .into_iter()
            .enumerate()
            .map(|(i, edge)| Connection {
                id: format!("{}_{}", edge.kind.prefix(), i + 1),
                source_ref: edge.source,
                target_ref: edge.target,
                kind: edge.kind,
                label: edge.label,
            })
            .collect();
        debug!(
            connections = connections.len(),
            diagnostics = self.diagnostics.len(),
            "inferred flow"
        );
        (connections, self.diagnostics)
    }

    // ========================================================================
    // PASS 1: EVENT LOG
    // ========================================================================

    fn apply(&mut self, event: &FlowEvent) {
        match event {
            FlowEvent::Declared(id) => self.declared(id),
            FlowEvent::BranchOpened {
                gateway,
                task,
                label,
            } => self.emit(
                ConnectionKind::SequenceFlow,
                gateway,
                task,
                Some(label.clone()),
            ),
            FlowEvent::BranchStep { after, id } => self.branch_step(after.as_deref(), id),
            FlowEvent::GatewayClosed {
                gateway,
                continuation,
            } => self.gateway_closed(gateway, continuation.as_deref()),
            FlowEvent::MessagePaired {
                sender,
                receiver,
                label,
            } => self.emit(
                ConnectionKind::MessageFlow,
                sender,
                receiver,
                Some(label.clone()),
            ),
            FlowEvent::Break => {
                self.threads.clear();
                self.cursor = None;
            }
        }
    }

    fn declared(&mut self, id: &str) {
        let Some(&element) = self.by_id.get(id) else {
            return;
        };
        let lane = element.lane.as_str();

        if element.kind != ElementKind::StartEvent {
            if let Some(thread) = self.threads.get(lane).copied() {
                self.emit(ConnectionKind::SequenceFlow, thread, &element.id, None);
            } else if let Some(cursor) = self.cursor.filter(|c| self.lane_of(c) != Some(lane)) {
                self.emit(ConnectionKind::SequenceFlow, cursor, &element.id, None);
            }
        }

        if element.kind == ElementKind::EndEvent {
            self.threads.remove(lane);
            self.cursor = None;
        } else {
            self.open_thread(lane, &element.id);
        }
    }

    /// Branch bodies chain from their own branch and leave lane threads alone.
    fn branch_step(&mut self, after: Option<&str>, id: &str) {
        let (Some(after), Some(&element)) = (after, self.by_id.get(id)) else {
            return;
        };
        if element.kind != ElementKind::StartEvent {
            self.emit(ConnectionKind::SequenceFlow, after, &element.id, None);
        }
    }

    fn gateway_closed(&mut self, id: &str, continuation: Option<&str>) {
        let Some(&gateway) = self.by_id.get(id) else {
            return;
        };
        let lane = gateway.lane.as_str();
        let next = continuation.and_then(|c| self.by_id.get(c).copied());
        match next {
            Some(element) => self.open_thread(lane, &element.id),
            None => {
                self.threads.remove(lane);
                self.cursor = None;
            }
        }
    }

    fn open_thread(&mut self, lane: &'a str, id: &'a str) {
        self.threads.insert(lane, id);
        self.cursor = Some(id);
    }

    fn lane_of(&self, id: &str) -> Option<&'a str> {
        self.by_id.get(id).map(|&e| e.lane.as_str())
    }

    // ========================================================================
    // PASS 2: DEFERRED RESOLUTION
    // ========================================================================

    fn associate_data(&mut self) {
        for element in self.document.elements() {
            let ElementKind::DataObject {
                associated: Some(associated),
            } = &element.kind
            else {
                continue;
            };
            match self.resolve(associated, &element.lane) {
                Some(target) => {
                    self.emit(ConnectionKind::DataAssociation, &element.id, target, None);
                }
                None => {
                    warn!(data = %element.id, task = %associated, "unresolved data association");
                    self.diagnose(
                        DiagnosticKind::UnresolvedDataAssociation,
                        element.line,
                        element.span,
                        format!(
                            "data object `{}` refers to `{associated}`, which is not declared",
                            element.label
                        ),
                    );
                }
            }
        }
    }

    fn resolve_reference(&mut self, reference: &DeferredRef) {
        let source = self.endpoint(&reference.source, &reference.lane);
        let target = self.endpoint(&reference.target, &reference.lane);
        match (source, target) {
            (Ok(source), Ok(target)) => {
                self.emit(reference.kind, source, target, reference.label.clone());
            }
            (Err(missing), _) | (_, Err(missing)) => {
                warn!(line = reference.line, reference = %missing, "dropped unresolved reference");
                self.diagnose(
                    DiagnosticKind::UnresolvedForwardReference,
                    reference.line,
                    reference.span,
                    format!("`{missing}` does not name any element"),
                );
            }
        }
    }

    fn endpoint<'r>(&self, endpoint: &'r RefEndpoint, lane: &str) -> Result<&'a str, &'r str> {
        match endpoint {
            RefEndpoint::Element(id) => self
                .by_id
                .get(id.as_str())
                .map(|&e| e.id.as_str())
                .ok_or(id.as_str()),
            RefEndpoint::Named(text) => self.resolve(text, lane).ok_or(text.as_str()),
        }
    }

    /// Looks an element up by reference text, preferring `lane`, then document order.
    fn resolve(&self, text: &str, lane: &str) -> Option<&'a str> {
        let text = text.trim();
        let text = text.strip_prefix('@').unwrap_or(text).trim();
        if text.is_empty() {
            return None;
        }

        if let Some((lane_name, name)) = text.split_once('.') {
            let lane_slug = slugify(lane_name);
            let slug = slugify(name);
            let qualified = self
                .document
                .lanes
                .iter()
                .filter(|l| slugify(&l.name) == lane_slug)
                .flat_map(|l| &l.elements)
                .find(|e| is_target(e) && names(e, &slug, name.trim()));
            if let Some(element) = qualified {
                return Some(element.id.as_str());
            }
        }

        let slug = slugify(text);
        let candidates: Vec<&'a Element> = self
            .document
            .elements()
            .into_iter()
            .filter(|e| is_target(e) && names(e, &slug, text))
            .collect();
        candidates
            .iter()
            .find(|e| e.lane == lane)
            .or_else(|| candidates.first())
            .copied()
            .map(|e| e.id.as_str())
    }

    // ========================================================================
    // OUTPUT
    // ========================================================================

    fn emit(&mut self, kind: ConnectionKind, source: &str, target: &str, label: Option<String>) {
        if !self
            .seen
            .insert((kind, source.to_string(), target.to_string()))
        {
            return;
        }
        trace!(?kind, source, target, "edge");
        self.edges.push(Edge {
            kind,
            source: source.to_string(),
            target: target.to_string(),
            label,
        });
    }

    fn diagnose(&mut self, kind: DiagnosticKind, line: usize, span: Span, message: String) {
        self.diagnostics
            .push(ParseDiagnostic::new(kind, line, span, message));
    }
}

/// Data objects and annotations are never reference targets.
fn is_target(element: &Element) -> bool {
    element.is_flow_node()
}

fn names(element: &Element, slug: &str, raw: &str) -> bool {
    slugify(&element.label) == slug || slugify(&element.display_label()) == slug || element.id == raw
}

/// Runs flow inference over a parsed document and assembles the published result.
/// Diagnostics are ordered by line; ties keep the order they were raised in.
pub fn infer(parsed: ParsedDocument) -> ParseResult {
    let ParsedDocument {
        document,
        events,
        references,
        mut diagnostics,
        ..
    } = parsed;
    let (connections, inferred) = FlowInference::new(&document).run(&events, &references);
    diagnostics.extend(inferred);
    diagnostics.sort_by_key(|d| d.line);
    ParseResult {
        document,
        connections,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseOptions;
    use crate::syntax::DocumentParser;

    fn infer_text(text: &str) -> ParseResult {
        let parsed = DocumentParser::new(&ParseOptions::default())
            .parse(text)
            .unwrap();
        infer(parsed)
    }

    fn edges(result: &ParseResult) -> Vec<(String, String)> {
        result
            .connections
            .iter()
            .map(|c| (c.source_ref.clone(), c.target_ref.clone()))
            .collect()
    }

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn test_start_event_has_no_incoming_edge() {
        let result = infer_text("@A\nprep\n!Start\nwork");
        assert_eq!(edges(&result), vec![pair("a_start", "a_work")]);
    }

    #[test]
    fn test_end_event_clears_thread_and_cursor() {
        let result = infer_text("@A\nwork\n!End\nlater\n@B\nother");
        assert_eq!(
            edges(&result),
            vec![pair("a_work", "a_end"), pair("a_later", "b_other")]
        );
    }

    #[test]
    fn test_break_clears_everything() {
        let result = infer_text("@A\none\n---\ntwo\n@B\nthree");
        assert_eq!(edges(&result), vec![pair("a_two", "b_three")]);
    }

    #[test]
    fn test_gateway_without_positive_branch_ends_thread() {
        let result = infer_text("@A\n?Stop\n  -halt\nnext");
        assert_eq!(edges(&result), vec![pair("a_stop", "a_halt")]);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let result = infer_text("@A\none -> two\ntwo");
        assert_eq!(edges(&result), vec![pair("a_one", "a_two")]);
        assert_eq!(result.connections[0].id, "seq_1");
    }

    #[test]
    fn test_lane_qualified_reference_prefers_named_lane() {
        let result = infer_text("@A\nreview\n@B\nreview\n^Escalate @A.review -> @B.review");
        let message = result
            .connections
            .iter()
            .find(|c| c.kind == ConnectionKind::MessageFlow)
            .unwrap();
        assert_eq!(message.source_ref, "a_review");
        assert_eq!(message.target_ref, "b_review");
        assert_eq!(message.label.as_deref(), Some("Escalate"));
    }

    #[test]
    fn test_unqualified_reference_prefers_own_lane() {
        let result = infer_text("@A\ncheck\n@B\ncheck\nstart <- check");
        assert!(edges(&result).contains(&pair("b_check", "b_start")));
        assert!(!edges(&result).contains(&pair("a_check", "b_start")));
    }

    #[test]
    fn test_data_association() {
        let result = infer_text("@A\npack\n#Label pack\n#Ghost nowhere");
        let data: Vec<_> = result
            .connections
            .iter()
            .filter(|c| c.kind == ConnectionKind::DataAssociation)
            .collect();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].source_ref, "a_data_label");
        assert_eq!(data[0].target_ref, "a_pack");
        assert_eq!(data[0].id, "data_1");
        assert_eq!(
            result.diagnostics[0].kind,
            DiagnosticKind::UnresolvedDataAssociation
        );
    }

    #[test]
    fn test_connection_ids_follow_final_position() {
        let result = infer_text("@A\nsend: Go\nwork\n@B\nreceive: Go");
        let ids: Vec<_> = result.connections.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["seq_1", "seq_2", "msg_3"]);
    }
}

//! Process model for BPMN-Lite
//!
//! The document tree (process, lanes, elements) built by the parser, the connections
//! synthesized by flow inference, and the published result shape that serializes to JSON.

// ============================================================================
// IMPORTS
// ============================================================================

use serde::Serialize;

use crate::diagnostics::ParseDiagnostic;
use crate::syntax::Span;

// ============================================================================
// DOCUMENT TREE
// ============================================================================

/// A parsed process: an optional name and its lanes in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    pub lanes: Vec<Lane>,
}

impl Document {
    /// All elements across lanes, in declaration order.
    pub fn elements(&self) -> Vec<&Element> {
        let mut elements: Vec<&Element> = self.lanes.iter().flat_map(|l| &l.elements).collect();
        elements.sort_by_key(|e| e.order);
        elements
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.lanes
            .iter()
            .flat_map(|l| &l.elements)
            .find(|e| e.id == id)
    }

    pub fn element_count(&self) -> usize {
        self.lanes.iter().map(|l| l.elements.len()).sum()
    }
}

/// A participant. Lane identity is its name; re-opening a lane appends to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lane {
    pub id: String,
    pub name: String,
    pub elements: Vec<Element>,
}

/// A node of the process graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    /// The label as written. For send and receive events this is the message.
    pub label: String,
    /// Id of the owning lane.
    pub lane: String,
    /// Position in the document, across all lanes.
    pub order: usize,
    /// 1-based source line.
    pub line: usize,
    #[serde(skip)]
    pub span: Span,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl Element {
    /// The text shown on the diagram node.
    pub fn display_label(&self) -> String {
        match &self.kind {
            ElementKind::SendEvent { message } => format!("send: {message}"),
            ElementKind::ReceiveEvent { message } => format!("receive: {message}"),
            _ => self.label.clone(),
        }
    }

    /// Whether the element takes part in sequence flow.
    pub fn is_flow_node(&self) -> bool {
        !matches!(
            self.kind,
            ElementKind::DataObject { .. } | ElementKind::Annotation { .. }
        )
    }
}

/// The closed set of element variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ElementKind {
    Task,
    Gateway {
        branches: Vec<Branch>,
    },
    SendEvent {
        message: String,
    },
    ReceiveEvent {
        message: String,
    },
    StartEvent,
    EndEvent,
    DataObject {
        /// Label of the task the data object belongs to, if one was named.
        #[serde(skip_serializing_if = "Option::is_none")]
        associated: Option<String>,
    },
    Annotation {
        #[serde(rename = "attachedTo", skip_serializing_if = "Option::is_none")]
        attached_to: Option<String>,
    },
}

impl ElementKind {
    /// Diagram style class of the element.
    pub fn class_name(&self) -> &'static str {
        match self {
            ElementKind::Task => "task",
            ElementKind::Gateway { .. } => "gateway",
            ElementKind::SendEvent { .. } | ElementKind::ReceiveEvent { .. } => "message",
            ElementKind::StartEvent | ElementKind::EndEvent => "event",
            ElementKind::DataObject { .. } => "dataObject",
            ElementKind::Annotation { .. } => "annotation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BranchSign {
    Positive,
    Negative,
}

impl BranchSign {
    /// Edge label used when a branch carries no explicit `|Label|`.
    pub fn default_label(&self) -> &'static str {
        match self {
            BranchSign::Positive => "Yes",
            BranchSign::Negative => "No",
        }
    }
}

/// One outgoing branch of a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub sign: BranchSign,
    /// Edge label: explicit or `Yes`/`No`.
    pub label: String,
    /// Id of the branch task.
    pub task: String,
}

// ============================================================================
// CONNECTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionKind {
    SequenceFlow,
    MessageFlow,
    DataAssociation,
}

impl ConnectionKind {
    /// Prefix of connection ids of this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            ConnectionKind::SequenceFlow => "seq",
            ConnectionKind::MessageFlow => "msg",
            ConnectionKind::DataAssociation => "data",
        }
    }
}

/// A directed edge between two elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub source_ref: String,
    pub target_ref: String,
    pub kind: ConnectionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

// ============================================================================
// PUBLISHED RESULT
// ============================================================================

/// The immutable result of a parse: the document, its connections and every
/// recoverable diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    #[serde(flatten)]
    pub document: Document,
    pub connections: Vec<Connection>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParseResult {
    pub fn process_name(&self) -> Option<&str> {
        self.document.process_name.as_deref()
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.document.lanes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str, order: usize, kind: ElementKind) -> Element {
        Element {
            id: id.to_string(),
            label: id.to_string(),
            lane: "lane_a".to_string(),
            order,
            line: order + 1,
            span: Span::default(),
            kind,
        }
    }

    #[test]
    fn test_element_json_carries_type_tag() {
        let el = element(
            "a_send_pay",
            0,
            ElementKind::SendEvent {
                message: "Pay".to_string(),
            },
        );
        let json = serde_json::to_value(&el).unwrap();
        assert_eq!(json["type"], "sendEvent");
        assert_eq!(json["message"], "Pay");
        assert!(json.get("span").is_none());
        assert_eq!(el.display_label(), "send: Pay");
    }

    #[test]
    fn test_elements_are_in_declaration_order() {
        let doc = Document {
            process_name: None,
            lanes: vec![
                Lane {
                    id: "lane_a".to_string(),
                    name: "A".to_string(),
                    elements: vec![element("x", 0, ElementKind::Task), element("z", 2, ElementKind::Task)],
                },
                Lane {
                    id: "lane_b".to_string(),
                    name: "B".to_string(),
                    elements: vec![element("y", 1, ElementKind::Task)],
                },
            ],
        };
        let ids: Vec<_> = doc.elements().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
        assert_eq!(doc.element_count(), 3);
        assert!(doc.element("y").is_some());
    }

    #[test]
    fn test_result_json_shape() {
        let result = ParseResult {
            document: Document {
                process_name: Some("Order".to_string()),
                lanes: vec![],
            },
            connections: vec![Connection {
                id: "seq_1".to_string(),
                source_ref: "a".to_string(),
                target_ref: "b".to_string(),
                kind: ConnectionKind::SequenceFlow,
                label: None,
            }],
            diagnostics: vec![],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["processName"], "Order");
        assert_eq!(json["connections"][0]["sourceRef"], "a");
        assert_eq!(json["connections"][0]["kind"], "sequenceFlow");
        assert!(json["connections"][0].get("label").is_none());
    }
}

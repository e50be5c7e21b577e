//! Mermaid transpiler
//!
//! Renders a document and its connections as a Mermaid `flowchart`. Output is a pure
//! function of its inputs: nodes in declaration order, edges in connection order.

use tracing::debug;

use crate::ast::{Connection, ConnectionKind, Document, Element, ElementKind};
use crate::config::RenderOptions;

const INDENT: &str = "  ";

/// Node classes and their `classDef` bodies, emitted in this order.
const CLASS_DEFS: [(&str, &str); 6] = [
    ("event", "fill:#ffd,stroke:#33f,stroke-width:2px"),
    ("task", "fill:#bbf,stroke:#33f,stroke-width:2px"),
    ("message", "fill:#bfb,stroke:#070,stroke-width:2px"),
    ("gateway", "fill:#fcc,stroke:#f00,stroke-width:2px"),
    ("dataObject", "fill:#ececff,stroke:#9370db,stroke-width:1px"),
    (
        "annotation",
        "fill:#ffd,stroke:#bb0,stroke-width:1px,stroke-dasharray:5 5",
    ),
];

/// Lane fills, alternating in lane order.
const LANE_STYLES: [&str; 2] = [
    "fill:#f9f9f9,stroke:#333,stroke-width:1px",
    "fill:#e6f3ff,stroke:#333,stroke-width:1px",
];

pub struct MermaidTranspiler<'a> {
    options: &'a RenderOptions,
}

impl<'a> MermaidTranspiler<'a> {
    pub fn new(options: &'a RenderOptions) -> Self {
        Self { options }
    }

    pub fn render(&self, document: &Document, connections: &[Connection]) -> String {
        let mut lines = Vec::new();

        if self.options.title {
            if let Some(name) = &document.process_name {
                lines.push("---".to_string());
                lines.push(format!("title: {}", yaml_scalar(name)));
                lines.push("---".to_string());
            }
        }
        lines.push(format!("flowchart {}", self.options.direction));

        if self.options.styles {
            for (class, body) in CLASS_DEFS {
                lines.push(format!("{INDENT}classDef {class} {body}"));
            }
        }

        for lane in &document.lanes {
            lines.push(format!(
                "{INDENT}subgraph {}[\"{}\"]",
                lane.id,
                escape_label(&lane.name)
            ));
            for element in &lane.elements {
                lines.push(format!("{INDENT}{INDENT}{}", self.node(element)));
            }
            lines.push(format!("{INDENT}end"));
        }

        for connection in connections {
            lines.push(format!("{INDENT}{}", edge(connection)));
        }

        for element in document.elements() {
            if let ElementKind::Annotation {
                attached_to: Some(target),
            } = &element.kind
            {
                lines.push(format!("{INDENT}{target} -.- {}", element.id));
            }
        }

        if self.options.styles {
            for (index, lane) in document.lanes.iter().enumerate() {
                let style = LANE_STYLES[index % LANE_STYLES.len()];
                lines.push(format!("{INDENT}style {} {style}", lane.id));
            }
        }

        debug!(
            lines = lines.len(),
            direction = %self.options.direction,
            "rendered mermaid"
        );

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    fn node(&self, element: &Element) -> String {
        let label = escape_label(&element.display_label());
        let id = &element.id;
        let shape = match element.kind {
            ElementKind::Task | ElementKind::Annotation { .. } => format!("{id}[\"{label}\"]"),
            ElementKind::Gateway { .. } => format!("{id}{{\"{label}\"}}"),
            ElementKind::SendEvent { .. } | ElementKind::ReceiveEvent { .. } => {
                format!("{id}>\"{label}\"]")
            }
            ElementKind::StartEvent => format!("{id}((\"{label}\"))"),
            ElementKind::EndEvent => format!("{id}(((\"{label}\")))"),
            ElementKind::DataObject { .. } => format!("{id}[/\"{label}\"/]"),
        };
        if self.options.styles {
            format!("{shape}:::{}", element.kind.class_name())
        } else {
            shape
        }
    }
}

fn edge(connection: &Connection) -> String {
    let (source, target) = (&connection.source_ref, &connection.target_ref);
    let label = connection.label.as_deref().map(escape_label);
    match (connection.kind, label) {
        (ConnectionKind::SequenceFlow, Some(label)) => format!("{source} -->|\"{label}\"| {target}"),
        (ConnectionKind::SequenceFlow, None) => format!("{source} --> {target}"),
        (ConnectionKind::MessageFlow, Some(label)) => format!("{source} -.->|\"{label}\"| {target}"),
        (ConnectionKind::MessageFlow, None) => format!("{source} -.-> {target}"),
        (ConnectionKind::DataAssociation, _) => format!("{source} -.- {target}"),
    }
}

/// Quotes are the one character a quoted Mermaid label cannot hold.
fn escape_label(text: &str) -> String {
    text.replace('"', "#quot;")
}

/// Front-matter value, quoted only when plain YAML would misread it.
fn yaml_scalar(text: &str) -> String {
    let plain = text
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '(' | ')'))
        && !text.starts_with(['-', ' '])
        && !text.ends_with(' ');
    if plain {
        text.to_string()
    } else {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

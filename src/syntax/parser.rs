//! BPMN-Lite document parser
//!
//! Consumes classified lines and builds the document tree. Besides the tree it records
//! what flow inference needs: an ordered log of flow events, the references that can
//! only be resolved once the whole document is known, and paired messages.
//! Parsing only fails on structural corruption; everything else becomes a diagnostic.

use std::collections::{HashMap, HashSet, VecDeque};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::ast::{Branch, BranchSign, ConnectionKind, Document, Element, ElementKind, Lane};
use crate::config::ParseOptions;
use crate::diagnostics::{DiagnosticKind, ParseDiagnostic};
use crate::syntax::{slugify, ArrowDirection, ClassifiedLine, LineClassifier, SigilKind, Span};
use crate::BplError;

static BRANCH_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\|([^|]*)\|\s*(.*)$").unwrap());

/// Annotation ids use at most this many characters of the note.
const NOTE_ID_CHARS: usize = 20;

// ============================================================================
// PARSER OUTPUT
// ============================================================================

/// One entry of the flow-event log, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// A flow element (task, event or gateway) was declared.
    Declared(String),
    /// A branch was attached to its gateway.
    BranchOpened {
        gateway: String,
        task: String,
        label: String,
    },
    /// A flow element was declared inside a branch body, following `after`.
    BranchStep { after: Option<String>, id: String },
    /// The branch set of an outermost gateway was closed; `continuation` is where its
    /// lane thread resumes.
    GatewayClosed {
        gateway: String,
        continuation: Option<String>,
    },
    /// The second side of a message arrived.
    MessagePaired {
        sender: String,
        receiver: String,
        label: String,
    },
    /// A `---` line.
    Break,
}

/// An endpoint of a deferred reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefEndpoint {
    /// Known at parse time.
    Element(String),
    /// Reference text to resolve against the finished document.
    Named(String),
}

/// A connection written explicitly in the document, resolved after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredRef {
    pub kind: ConnectionKind,
    pub source: RefEndpoint,
    pub target: RefEndpoint,
    pub label: Option<String>,
    /// Lane the reference was written in; its elements win name lookups.
    pub lane: String,
    pub line: usize,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSide {
    Send,
    Receive,
}

/// A send or receive still waiting for its counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub label: String,
    pub element: String,
    pub side: MessageSide,
    pub order: usize,
    pub line: usize,
    pub span: Span,
}

/// Everything the parser produces for one document.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub document: Document,
    pub events: Vec<FlowEvent>,
    pub references: Vec<DeferredRef>,
    /// Sends and receives left without a counterpart, in declaration order.
    pub unmatched: Vec<PendingMessage>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

// ============================================================================
// PARSER STATE
// ============================================================================

/// The branch whose lines are currently being read.
#[derive(Debug, Clone)]
struct BranchBody {
    sign: BranchSign,
    /// Last flow element of the body; `None` after an end event.
    tail: Option<String>,
}

#[derive(Debug, Clone)]
struct OpenGateway {
    id: String,
    lane: usize,
    index: usize,
    depth: usize,
    branches: usize,
    body: Option<BranchBody>,
    continuation: Option<String>,
    continued: bool,
}

impl OpenGateway {
    /// Ends the current branch body. The first positive body decides the continuation.
    fn finish_body(&mut self) {
        if let Some(body) = self.body.take() {
            if body.sign == BranchSign::Positive && !self.continued {
                self.continuation = body.tail;
                self.continued = true;
            }
        }
    }
}

/// Stateful parser for a single document.
#[derive(Debug)]
pub struct DocumentParser<'a> {
    options: &'a ParseOptions,
    document: Document,
    lanes_by_name: HashMap<String, usize>,
    current_lane: Option<usize>,
    used_ids: HashSet<String>,
    declared: HashSet<(usize, String)>,
    /// Innermost gateway last.
    gateways: Vec<OpenGateway>,
    last_element: Option<String>,
    last_flow_node: Option<String>,
    pending: HashMap<String, VecDeque<PendingMessage>>,
    next_order: usize,
    events: Vec<FlowEvent>,
    references: Vec<DeferredRef>,
    diagnostics: Vec<ParseDiagnostic>,
}

impl<'a> DocumentParser<'a> {
    pub fn new(options: &'a ParseOptions) -> Self {
        Self {
            options,
            document: Document::default(),
            lanes_by_name: HashMap::new(),
            current_lane: None,
            used_ids: HashSet::new(),
            declared: HashSet::new(),
            gateways: Vec::new(),
            last_element: None,
            last_flow_node: None,
            pending: HashMap::new(),
            next_order: 0,
            events: Vec::new(),
            references: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Parses a whole document.
    pub fn parse(mut self, text: &str) -> Result<ParsedDocument, BplError> {
        let mut classifier = LineClassifier::new(self.options.max_depth);
        let lines = classifier.classify_all(text, &mut self.diagnostics)?;
        for line in lines {
            self.consume(line);
        }
        self.close_gateways(|_| true);

        let unmatched = self.drain_unmatched();
        for message in &unmatched {
            let side = match message.side {
                MessageSide::Send => "send",
                MessageSide::Receive => "receive",
            };
            self.diagnostics.push(ParseDiagnostic::new(
                DiagnosticKind::UnmatchedMessage,
                message.line,
                message.span,
                format!("{side} of message `{}` has no counterpart", message.label),
            ));
        }

        debug!(
            lanes = self.document.lanes.len(),
            elements = self.document.element_count(),
            events = self.events.len(),
            references = self.references.len(),
            diagnostics = self.diagnostics.len(),
            "parsed document"
        );

        Ok(ParsedDocument {
            document: self.document,
            events: self.events,
            references: self.references,
            unmatched,
            diagnostics: self.diagnostics,
        })
    }

    fn consume(&mut self, line: ClassifiedLine) {
        let depth = line.depth;
        match line.kind {
            SigilKind::Comment => return,
            SigilKind::Lane | SigilKind::ConnectionBreak => self.close_gateways(|_| true),
            SigilKind::BranchPositive | SigilKind::BranchNegative => {
                self.close_gateways(|open| open.depth > depth)
            }
            // A flow line inside a gateway needs a branch to hang from.
            kind if kind.declares_flow_node() => {
                self.close_gateways(|open| open.depth >= depth || open.body.is_none())
            }
            _ => self.close_gateways(|open| open.depth >= depth),
        }
        if line.kind == SigilKind::ConnectionBreak {
            self.events.push(FlowEvent::Break);
            return;
        }
        if line.text.is_empty() {
            self.empty_payload(&line);
            return;
        }

        match line.kind {
            SigilKind::ProcessName => self.name_process(&line),
            SigilKind::Lane => {
                self.open_lane(&line.text);
            }
            SigilKind::Gateway => self.open_gateway(&line),
            SigilKind::BranchPositive => self.branch(&line, BranchSign::Positive),
            SigilKind::BranchNegative => self.branch(&line, BranchSign::Negative),
            SigilKind::Send => self.message(&line, MessageSide::Send),
            SigilKind::Receive => self.message(&line, MessageSide::Receive),
            SigilKind::Annotation => self.annotate(&line),
            SigilKind::ExplicitConnection => self.explicit_connection(&line),
            SigilKind::DataObject => self.data_object(&line),
            SigilKind::StartEvent => {
                self.flow_node(&line, line.text.clone(), ElementKind::StartEvent);
            }
            SigilKind::EndEvent => {
                self.flow_node(&line, line.text.clone(), ElementKind::EndEvent);
            }
            SigilKind::PlainTask => {
                self.flow_node(&line, line.text.clone(), ElementKind::Task);
            }
            SigilKind::Comment | SigilKind::ConnectionBreak => {}
        }
    }

    // ------------------------------------------------------------------------
    // Lanes and process
    // ------------------------------------------------------------------------

    fn name_process(&mut self, line: &ClassifiedLine) {
        match &self.document.process_name {
            Some(existing) => {
                let message = format!(
                    "process is already named `{existing}`; `{}` is ignored",
                    line.text
                );
                self.diagnose(DiagnosticKind::RedefinedProcess, line, message);
            }
            None => self.document.process_name = Some(line.text.clone()),
        }
    }

    fn open_lane(&mut self, name: &str) -> usize {
        if let Some(&index) = self.lanes_by_name.get(name) {
            self.current_lane = Some(index);
            return index;
        }
        let id = self.allocate_id(&format!("lane_{}", slugify(name)));
        let index = self.document.lanes.len();
        self.document.lanes.push(Lane {
            id,
            name: name.to_string(),
            elements: Vec::new(),
        });
        self.lanes_by_name.insert(name.to_string(), index);
        self.current_lane = Some(index);
        index
    }

    /// The lane new elements go into, opening the default lane on first use.
    fn lane(&mut self) -> usize {
        match self.current_lane {
            Some(index) => index,
            None => {
                let name = self.options.default_lane.clone();
                self.open_lane(&name)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Gateways
    // ------------------------------------------------------------------------

    fn open_gateway(&mut self, line: &ClassifiedLine) {
        let (lane, index) = self.flow_node(
            line,
            line.text.clone(),
            ElementKind::Gateway {
                branches: Vec::new(),
            },
        );
        self.gateways.push(OpenGateway {
            id: self.document.lanes[lane].elements[index].id.clone(),
            lane,
            index,
            depth: line.depth,
            branches: 0,
            body: None,
            continuation: None,
            continued: false,
        });
    }

    /// Closes open gateways from the innermost outwards while `closes` holds.
    fn close_gateways(&mut self, mut closes: impl FnMut(&OpenGateway) -> bool) {
        while let Some(open) = self.gateways.last() {
            if !closes(open) {
                break;
            }
            self.close_gateway();
        }
    }

    fn close_gateway(&mut self) {
        let Some(mut open) = self.gateways.pop() else {
            return;
        };
        open.finish_body();
        // A gateway without branches stays the thread itself.
        let continuation = if open.branches == 0 {
            Some(open.id.clone())
        } else {
            open.continuation
        };
        match self.gateways.last_mut() {
            Some(parent) => {
                if let Some(body) = &mut parent.body {
                    body.tail = continuation;
                }
            }
            None => self.events.push(FlowEvent::GatewayClosed {
                gateway: open.id,
                continuation,
            }),
        }
    }

    fn branch(&mut self, line: &ClassifiedLine, sign: BranchSign) {
        let (explicit_label, text) = match BRANCH_LABEL.captures(&line.text) {
            Some(caps) => (
                Some(caps[1].trim().to_string()).filter(|l| !l.is_empty()),
                caps[2].trim().to_string(),
            ),
            None => (None, line.text.clone()),
        };
        if text.is_empty() {
            self.empty_payload(line);
            return;
        }

        let Some(open) = self.gateways.last() else {
            self.diagnose(
                DiagnosticKind::OrphanBranch,
                line,
                format!("branch `{text}` has no gateway above it; treated as a task"),
            );
            self.flow_node(line, text, ElementKind::Task);
            return;
        };
        let (gateway_id, gateway_lane, gateway_index) = (open.id.clone(), open.lane, open.index);

        if line.depth == open.depth {
            self.diagnose(
                DiagnosticKind::MalformedIndentation,
                line,
                format!("branch `{text}` should be indented below its gateway"),
            );
        }

        // Branch tasks are wired by their gateway and never `Declared`.
        let (lane, index) = self.declare(line, text.clone(), ElementKind::Task, base_id_for(&text));
        let task = self.document.lanes[lane].elements[index].id.clone();
        self.track_arrow(line, &task);
        self.last_flow_node = Some(task.clone());

        if let Some(open) = self.gateways.last_mut() {
            open.finish_body();
            open.branches += 1;
            open.body = Some(BranchBody {
                sign,
                tail: Some(task.clone()),
            });
        }
        let label = explicit_label.unwrap_or_else(|| sign.default_label().to_string());
        self.events.push(FlowEvent::BranchOpened {
            gateway: gateway_id,
            task: task.clone(),
            label: label.clone(),
        });
        let gateway = &mut self.document.lanes[gateway_lane].elements[gateway_index];
        if let ElementKind::Gateway { branches } = &mut gateway.kind {
            branches.push(Branch { sign, label, task });
        }
    }

    // ------------------------------------------------------------------------
    // Elements
    // ------------------------------------------------------------------------

    /// Declares a flow element and logs it.
    fn flow_node(&mut self, line: &ClassifiedLine, label: String, kind: ElementKind) -> (usize, usize) {
        let base = base_id_for(&label);
        let ends = kind == ElementKind::EndEvent;
        let (lane, index) = self.declare(line, label, kind, base);
        let id = self.document.lanes[lane].elements[index].id.clone();
        self.log_flow(line, id, ends);
        (lane, index)
    }

    /// Appends a declared flow element to the log, inside the open branch body if any.
    fn log_flow(&mut self, line: &ClassifiedLine, id: String, ends: bool) {
        match self.gateways.last_mut().and_then(|open| open.body.as_mut()) {
            Some(body) => {
                let after = body.tail.take();
                if !ends {
                    body.tail = Some(id.clone());
                }
                self.events.push(FlowEvent::BranchStep {
                    after,
                    id: id.clone(),
                });
            }
            None => self.events.push(FlowEvent::Declared(id.clone())),
        }
        self.track_arrow(line, &id);
        self.last_flow_node = Some(id);
    }

    fn message(&mut self, line: &ClassifiedLine, side: MessageSide) {
        let (kind, display) = match side {
            MessageSide::Send => (
                ElementKind::SendEvent {
                    message: line.text.clone(),
                },
                format!("send: {}", line.text),
            ),
            MessageSide::Receive => (
                ElementKind::ReceiveEvent {
                    message: line.text.clone(),
                },
                format!("receive: {}", line.text),
            ),
        };
        let (lane, index) = self.declare(line, line.text.clone(), kind, base_id_for(&display));
        let element = &self.document.lanes[lane].elements[index];
        let (id, order) = (element.id.clone(), element.order);
        self.log_flow(line, id.clone(), false);

        let entry = PendingMessage {
            label: line.text.clone(),
            element: id,
            side,
            order,
            line: line.line,
            span: line.span,
        };
        self.pair_message(entry);
    }

    fn pair_message(&mut self, entry: PendingMessage) {
        let queue = self.pending.entry(entry.label.clone()).or_default();
        // A queue only ever holds one side: the other side would have paired.
        let pairs = queue.front().is_some_and(|front| front.side != entry.side);
        if !pairs {
            queue.push_back(entry);
            return;
        }
        let Some(waiting) = queue.pop_front() else {
            return;
        };
        let (sender, receiver) = match entry.side {
            MessageSide::Send => (entry.element, waiting.element),
            MessageSide::Receive => (waiting.element, entry.element),
        };
        self.events.push(FlowEvent::MessagePaired {
            sender,
            receiver,
            label: entry.label,
        });
    }

    fn drain_unmatched(&mut self) -> Vec<PendingMessage> {
        let mut unmatched: Vec<PendingMessage> = self
            .pending
            .drain()
            .flat_map(|(_, queue)| queue)
            .collect();
        unmatched.sort_by_key(|m| m.order);
        unmatched
    }

    fn data_object(&mut self, line: &ClassifiedLine) {
        let (name, associated) = match line.text.split_once(char::is_whitespace) {
            Some((name, rest)) => (name.to_string(), Some(rest.trim().to_string())),
            None => (line.text.clone(), None),
        };
        let lane = self.lane();
        let base = format!("{}_data_{}", self.lane_slug(lane), slugify(&name));
        let kind = ElementKind::DataObject {
            associated: associated.filter(|a| !a.is_empty()),
        };
        self.declare_with_base(line, name, kind, base);
    }

    fn annotate(&mut self, line: &ClassifiedLine) {
        let lane = self.lane();
        let head: String = line.text.chars().take(NOTE_ID_CHARS).collect();
        let base = format!("{}_note_{}", self.lane_slug(lane), slugify(&head));
        let kind = ElementKind::Annotation {
            attached_to: self.last_element.clone(),
        };
        self.declare_with_base(line, line.text.clone(), kind, base);
    }

    fn explicit_connection(&mut self, line: &ClassifiedLine) {
        let Some((left, direction, right)) = split_connection(&line.text) else {
            self.diagnose(
                DiagnosticKind::MalformedConnection,
                line,
                format!(
                    "`^{}` needs the form `Label @Lane.source -> @Lane.target`",
                    line.text
                ),
            );
            return;
        };

        let (label, written_source) = match left.find('@') {
            Some(at) => (left[..at].trim(), Some(left[at..].trim())),
            None => (left.trim(), None),
        };
        let near = match written_source {
            Some(source) => RefEndpoint::Named(source.to_string()),
            None => match &self.last_flow_node {
                Some(previous) => RefEndpoint::Element(previous.clone()),
                None => {
                    self.diagnose(
                        DiagnosticKind::MalformedConnection,
                        line,
                        format!("`^{}` has no source and no element precedes it", line.text),
                    );
                    return;
                }
            },
        };
        let far = RefEndpoint::Named(right.to_string());
        let (source, target) = match direction {
            ArrowDirection::Forward => (near, far),
            ArrowDirection::Backward => (far, near),
        };

        let lane = self.lane();
        self.references.push(DeferredRef {
            kind: ConnectionKind::MessageFlow,
            source,
            target,
            label: Some(label.to_string()).filter(|l| !l.is_empty()),
            lane: self.document.lanes[lane].id.clone(),
            line: line.line,
            span: line.span,
        });
    }

    /// Records the inline arrow of a line as a deferred sequence flow.
    fn track_arrow(&mut self, line: &ClassifiedLine, id: &str) {
        let Some(arrow) = &line.arrow else {
            return;
        };
        let this = RefEndpoint::Element(id.to_string());
        let other = RefEndpoint::Named(arrow.target.clone());
        let (source, target) = match arrow.direction {
            ArrowDirection::Forward => (this, other),
            ArrowDirection::Backward => (other, this),
        };
        let lane = self.lane();
        self.references.push(DeferredRef {
            kind: ConnectionKind::SequenceFlow,
            source,
            target,
            label: None,
            lane: self.document.lanes[lane].id.clone(),
            line: line.line,
            span: line.span,
        });
    }

    /// Adds an element whose id is `<lane slug>_<base>`.
    fn declare(
        &mut self,
        line: &ClassifiedLine,
        label: String,
        kind: ElementKind,
        base: String,
    ) -> (usize, usize) {
        let lane = self.lane();
        let base = format!("{}_{}", self.lane_slug(lane), base);
        self.declare_with_base(line, label, kind, base)
    }

    fn declare_with_base(
        &mut self,
        line: &ClassifiedLine,
        label: String,
        kind: ElementKind,
        base: String,
    ) -> (usize, usize) {
        let lane = self.lane();
        let repeatable = matches!(
            kind,
            ElementKind::StartEvent | ElementKind::EndEvent | ElementKind::Annotation { .. }
        );
        if !self.declared.insert((lane, base.clone())) && !repeatable {
            let message = format!(
                "`{label}` is declared more than once in lane `{}`",
                self.document.lanes[lane].name
            );
            self.diagnose(DiagnosticKind::DuplicateLabel, line, message);
        }

        let id = self.allocate_id(&base);
        let is_annotation = matches!(kind, ElementKind::Annotation { .. });
        let element = Element {
            id: id.clone(),
            label,
            lane: self.document.lanes[lane].id.clone(),
            order: self.next_order,
            line: line.line,
            span: line.span,
            kind,
        };
        self.next_order += 1;
        if !is_annotation {
            self.last_element = Some(id);
        }

        let elements = &mut self.document.lanes[lane].elements;
        elements.push(element);
        (lane, elements.len() - 1)
    }

    /// Returns `base`, or `base_2`, `base_3`, … when taken.
    fn allocate_id(&mut self, base: &str) -> String {
        let mut id = base.to_string();
        let mut suffix = 2;
        while self.used_ids.contains(&id) {
            id = format!("{base}_{suffix}");
            suffix += 1;
        }
        self.used_ids.insert(id.clone());
        id
    }

    fn lane_slug(&self, lane: usize) -> String {
        slugify(&self.document.lanes[lane].name)
    }

    fn empty_payload(&mut self, line: &ClassifiedLine) {
        self.diagnose(
            DiagnosticKind::EmptyPayload,
            line,
            format!("{:?} line has nothing after its sigil; skipped", line.kind),
        );
    }

    fn diagnose(&mut self, kind: DiagnosticKind, line: &ClassifiedLine, message: String) {
        self.diagnostics
            .push(ParseDiagnostic::new(kind, line.line, line.span, message));
    }
}

fn base_id_for(label: &str) -> String {
    slugify(label)
}

/// Splits the payload of a `^` line at its arrow.
fn split_connection(text: &str) -> Option<(&str, ArrowDirection, &str)> {
    let forward = text.find("->");
    let backward = text.find("<-");
    let (index, direction) = match (forward, backward) {
        (Some(f), Some(b)) if b < f => (b, ArrowDirection::Backward),
        (Some(f), _) => (f, ArrowDirection::Forward),
        (None, Some(b)) => (b, ArrowDirection::Backward),
        (None, None) => return None,
    };
    let right = text[index + 2..].trim();
    if right.is_empty() {
        return None;
    }
    Some((&text[..index], direction, right))
}

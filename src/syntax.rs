//! Syntax module for BPMN-Lite
//!
//! This module holds the token types shared by the line classifier and the document
//! parser, and the slug function every identifier is derived from.

use serde::{Deserialize, Serialize};

pub mod classifier;
pub mod parser;

pub use classifier::{IndentUnit, LineClassifier};
pub use parser::{
    DeferredRef, DocumentParser, FlowEvent, MessageSide, ParsedDocument, PendingMessage,
    RefEndpoint,
};

/// Represents a byte range in the source text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        (span.start, span.len()).into()
    }
}

/// The line kinds of the notation, decided by the leading sigil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigilKind {
    /// `:Name`
    ProcessName,
    /// `@Name`
    Lane,
    /// `?Question`
    Gateway,
    /// `+text`
    BranchPositive,
    /// `-text`
    BranchNegative,
    /// `send: Message`
    Send,
    /// `receive: Message`
    Receive,
    /// `"text`
    Annotation,
    /// `^Label @Lane.elem -> @Lane2.elem2`
    ExplicitConnection,
    /// `#Name task label`
    DataObject,
    /// `!Start`
    StartEvent,
    /// `!End` and any other `!text`
    EndEvent,
    /// `---`
    ConnectionBreak,
    /// `// text`
    Comment,
    /// No sigil.
    PlainTask,
}

impl SigilKind {
    /// Whether an inline `->`/`<-` arrow is recognised on lines of this kind.
    pub fn accepts_arrow(&self) -> bool {
        matches!(
            self,
            SigilKind::PlainTask
                | SigilKind::Send
                | SigilKind::Receive
                | SigilKind::BranchPositive
                | SigilKind::BranchNegative
                | SigilKind::StartEvent
                | SigilKind::EndEvent
        )
    }

    /// Lines of these kinds declare a task, event or gateway.
    pub fn declares_flow_node(&self) -> bool {
        matches!(
            self,
            SigilKind::PlainTask
                | SigilKind::Gateway
                | SigilKind::Send
                | SigilKind::Receive
                | SigilKind::StartEvent
                | SigilKind::EndEvent
        )
    }
}

/// Direction of an inline arrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowDirection {
    /// `label -> target`: the line's element flows into the target.
    Forward,
    /// `label <- source`: the referenced element flows into the line's element.
    Backward,
}

/// An inline arrow split off a task line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineArrow {
    pub direction: ArrowDirection,
    pub target: String,
}

/// One physical, non-blank line after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub kind: SigilKind,
    /// Indentation depth in units of the document's indentation.
    pub depth: usize,
    /// Payload text with the sigil and any inline arrow removed.
    pub text: String,
    pub arrow: Option<InlineArrow>,
    /// 1-based line number.
    pub line: usize,
    /// Span of the trimmed line in the source.
    pub span: Span,
}

/// Lowercase ASCII slug used for every identifier: runs of anything else collapse to `_`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    if slug.is_empty() {
        return "unknown".to_string();
    }
    slug
}

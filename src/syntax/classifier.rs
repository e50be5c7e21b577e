//! Line classifier
//!
//! Turns each physical line into a [`ClassifiedLine`]: sigil kind, indentation depth and
//! payload. The only state carried between lines is the indentation unit (fixed by the
//! first indented line) and the previous depth, which malformed lines fall back to.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diagnostics::{DiagnosticKind, ParseDiagnostic};
use crate::err_msg;
use crate::syntax::{ArrowDirection, ClassifiedLine, InlineArrow, SigilKind, Span};
use crate::BplError;

static CONNECTION_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-{3,}$").unwrap());

/// The indentation unit of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentUnit {
    /// A fixed number of spaces per level.
    Spaces(usize),
    /// One tab per level.
    Tabs,
}

/// Stateful line classifier; one instance per document.
#[derive(Debug)]
pub struct LineClassifier {
    unit: Option<IndentUnit>,
    previous_depth: usize,
    max_depth: usize,
}

impl LineClassifier {
    pub fn new(max_depth: usize) -> Self {
        Self {
            unit: None,
            previous_depth: 0,
            max_depth,
        }
    }

    /// The unit detected so far, if any indented line has been seen.
    pub fn unit(&self) -> Option<IndentUnit> {
        self.unit
    }

    /// Classifies every line of `text`. Blank lines are dropped.
    pub fn classify_all(
        &mut self,
        text: &str,
        diagnostics: &mut Vec<ParseDiagnostic>,
    ) -> Result<Vec<ClassifiedLine>, BplError> {
        let mut lines = Vec::new();
        let mut offset = 0;
        for (index, raw) in text.split('\n').enumerate() {
            let content = raw.strip_suffix('\r').unwrap_or(raw);
            if let Some(line) = self.classify(content, index + 1, offset, diagnostics)? {
                lines.push(line);
            }
            offset += raw.len() + 1;
        }
        Ok(lines)
    }

    /// Classifies one raw line starting at byte `offset` of the document.
    pub fn classify(
        &mut self,
        raw: &str,
        line: usize,
        offset: usize,
        diagnostics: &mut Vec<ParseDiagnostic>,
    ) -> Result<Option<ClassifiedLine>, BplError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let indent_len = raw.len() - raw.trim_start().len();
        let start = offset + indent_len;
        let span = Span::new(start, start + trimmed.len());
        let depth = self.measure(&raw[..indent_len], line, span, diagnostics)?;

        let (mut kind, payload) = split_sigil(trimmed);
        if kind == SigilKind::PlainTask && starts_with_punctuation(trimmed) {
            diagnostics.push(ParseDiagnostic::new(
                DiagnosticKind::UnknownSigil,
                line,
                span,
                format!(
                    "unknown sigil `{}`; line treated as a plain task",
                    trimmed.chars().next().unwrap_or_default()
                ),
            ));
        }

        let (text, arrow) = if kind.accepts_arrow() {
            split_arrow(payload)
        } else {
            (payload.to_string(), None)
        };

        if kind == SigilKind::EndEvent && text.eq_ignore_ascii_case("start") {
            kind = SigilKind::StartEvent;
        }

        Ok(Some(ClassifiedLine {
            kind,
            depth,
            text,
            arrow,
            line,
            span,
        }))
    }

    fn measure(
        &mut self,
        indent: &str,
        line: usize,
        span: Span,
        diagnostics: &mut Vec<ParseDiagnostic>,
    ) -> Result<usize, BplError> {
        let depth = match self.depth_of(indent) {
            Ok(depth) => depth,
            Err(reason) => {
                diagnostics.push(ParseDiagnostic::new(
                    DiagnosticKind::MalformedIndentation,
                    line,
                    span,
                    format!("{reason}; treated as depth {}", self.previous_depth),
                ));
                self.previous_depth
            }
        };

        if depth > self.max_depth {
            return Err(err_msg!(
                StructuralCorruption,
                "line {} is nested {} levels deep, the limit is {}",
                line,
                depth,
                self.max_depth
            )
            .at_line(line)
            .at_span(span));
        }

        self.previous_depth = depth;
        Ok(depth)
    }

    fn depth_of(&mut self, indent: &str) -> Result<usize, String> {
        if indent.is_empty() {
            return Ok(0);
        }

        let width = indent.chars().count();
        let found = if indent.chars().all(|c| c == ' ') {
            IndentUnit::Spaces(width)
        } else if indent.chars().all(|c| c == '\t') {
            IndentUnit::Tabs
        } else {
            return Err("indentation mixes tabs, spaces or other whitespace".to_string());
        };

        // The first indented line fixes the unit.
        let unit = *self.unit.get_or_insert(found);
        match (unit, found) {
            (IndentUnit::Spaces(size), IndentUnit::Spaces(_)) if width % size == 0 => {
                Ok(width / size)
            }
            (IndentUnit::Spaces(size), IndentUnit::Spaces(_)) => Err(format!(
                "indentation of {width} spaces is not a multiple of the {size}-space unit"
            )),
            (IndentUnit::Tabs, IndentUnit::Tabs) => Ok(width),
            (IndentUnit::Spaces(_), IndentUnit::Tabs) => {
                Err("tab indentation in a space-indented document".to_string())
            }
            (IndentUnit::Tabs, IndentUnit::Spaces(_)) => {
                Err("space indentation in a tab-indented document".to_string())
            }
        }
    }
}

/// Splits the leading sigil off a trimmed line.
fn split_sigil(line: &str) -> (SigilKind, &str) {
    if CONNECTION_BREAK.is_match(line) {
        return (SigilKind::ConnectionBreak, "");
    }
    if let Some(rest) = line.strip_prefix("//") {
        return (SigilKind::Comment, rest.trim());
    }
    if let Some(rest) = line.strip_prefix("send:") {
        return (SigilKind::Send, rest.trim());
    }
    if let Some(rest) = line.strip_prefix("receive:") {
        return (SigilKind::Receive, rest.trim());
    }

    let mut chars = line.chars();
    let Some(first) = chars.next() else {
        return (SigilKind::PlainTask, line);
    };
    let rest = chars.as_str().trim();
    let kind = match first {
        ':' => SigilKind::ProcessName,
        '@' => SigilKind::Lane,
        '?' => SigilKind::Gateway,
        '+' => SigilKind::BranchPositive,
        '-' => SigilKind::BranchNegative,
        '^' => SigilKind::ExplicitConnection,
        '#' => SigilKind::DataObject,
        '!' => SigilKind::EndEvent,
        '"' => {
            let text = rest.strip_suffix('"').unwrap_or(rest).trim();
            return (SigilKind::Annotation, text);
        }
        _ => return (SigilKind::PlainTask, line),
    };
    (kind, rest)
}

fn starts_with_punctuation(line: &str) -> bool {
    line.chars().next().is_some_and(|c| c.is_ascii_punctuation())
}

/// Splits `label -> target` / `label <- source` at the first arrow.
fn split_arrow(payload: &str) -> (String, Option<InlineArrow>) {
    let forward = payload.find("->");
    let backward = payload.find("<-");
    let (index, direction) = match (forward, backward) {
        (Some(f), Some(b)) if b < f => (b, ArrowDirection::Backward),
        (Some(f), _) => (f, ArrowDirection::Forward),
        (None, Some(b)) => (b, ArrowDirection::Backward),
        (None, None) => return (payload.to_string(), None),
    };

    let label = payload[..index].trim().to_string();
    let target = payload[index + 2..].trim();
    if target.is_empty() {
        return (label, None);
    }
    let arrow = InlineArrow {
        direction,
        target: target.to_string(),
    };
    (label, Some(arrow))
}

//
// parser.rs
//
// Tolerant line-oriented parser for justfile recipes and variables
//

use std::fmt;

/// Separator between a variable name and its value
const VARIABLE_SEPARATOR: &str = ":=";

/// Inclusive byte range into a source buffer.
///
/// Spans are never empty: `start <= end < source.len()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} after end {end}");
        Self { start, end }
    }

    /// Build a span from a half-open range, or `None` if the range is empty.
    pub fn from_range(range: std::ops::Range<usize>) -> Option<Self> {
        (range.start < range.end).then(|| Self::new(range.start, range.end - 1))
    }

    /// Text covered by the span, or "" if it does not fit the source.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start..=self.end).unwrap_or("")
    }
}

/// Kind-specific payload of a definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Variable {
        /// Everything after `:=`, untrimmed. `None` when nothing follows.
        value: Option<Span>,
    },
    Recipe {
        dependencies: Vec<Span>,
        body: Vec<Span>,
    },
}

/// A recipe or variable definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: Span,
    /// 0-based line of the declaration
    pub line: usize,
    /// 0-based byte column of the name within its line
    pub column: usize,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_recipe(&self) -> bool {
        matches!(self.kind, NodeKind::Recipe { .. })
    }

    pub fn name_text<'a>(&self, source: &'a str) -> &'a str {
        self.name.text(source)
    }
}

/// Recoverable error recorded while parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line + 1, self.column + 1, self.message)
    }
}

/// Output of [`parse`]. Owns the source it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    source: String,
    nodes: Vec<Node>,
    errors: Vec<ParseError>,
    line_starts: Vec<usize>,
}

impl ParseResult {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Definitions in declaration order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Byte offset where each line starts. Strictly increasing; a trailing
    /// newline contributes a final empty line.
    pub fn line_starts(&self) -> &[usize] {
        &self.line_starts
    }

    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// Text of a line without its terminator (`\n` or `\r\n`).
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let start = self.line_start(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.source.len());
        let text = &self.source[start..end];
        Some(text.strip_suffix('\r').unwrap_or(text))
    }

    /// Map a byte offset to a 0-based (line, byte column) pair.
    /// Offsets past the end clamp to the end of the buffer.
    pub fn offset_to_line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        (line, offset - self.line_starts[line])
    }
}

/// Parse a justfile buffer. Never fails; problems are collected in
/// [`ParseResult::errors`] and parsing continues with the next line.
pub fn parse(source: impl Into<String>) -> ParseResult {
    let source = source.into();
    let line_starts = compute_line_starts(&source);

    let mut state = LineFold::default();
    let mut offset = 0;
    for (line_no, raw) in source.split('\n').enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        state.line(line_no, offset, line);
        offset += raw.len() + 1;
    }

    ParseResult {
        source,
        nodes: state.nodes,
        errors: state.errors,
        line_starts,
    }
}

fn compute_line_starts(source: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Index of the first `:` that is not the start of `:=`.
pub fn find_header_separator(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    bytes
        .iter()
        .enumerate()
        .position(|(i, &b)| b == b':' && bytes.get(i + 1) != Some(&b'='))
}

/// Fold state carried across lines.
#[derive(Default)]
struct LineFold {
    nodes: Vec<Node>,
    errors: Vec<ParseError>,
    /// Index into `nodes` of the recipe collecting body lines
    current_recipe: Option<usize>,
}

impl LineFold {
    fn line(&mut self, line_no: usize, line_start: usize, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return;
        }

        let header = find_header_separator(line);
        match line.find(VARIABLE_SEPARATOR) {
            Some(sep) if header.map_or(true, |h| sep < h) => {
                self.variable(line_no, line_start, line, sep)
            }
            _ => match header {
                Some(sep) => self.recipe(line_no, line_start, line, sep),
                None if line.starts_with(char::is_whitespace) => {
                    self.body_line(line_no, line_start, line)
                }
                None => {
                    self.error(line_no, 0, "unrecognized line");
                    self.current_recipe = None;
                }
            },
        }
    }

    fn variable(&mut self, line_no: usize, line_start: usize, line: &str, sep: usize) {
        self.current_recipe = None;

        let Some((name, column)) = trimmed_name(line_start, &line[..sep]) else {
            self.error(line_no, sep, "malformed variable");
            return;
        };

        let value_start = sep + VARIABLE_SEPARATOR.len();
        let value = Span::from_range(line_start + value_start..line_start + line.len());

        self.nodes.push(Node {
            name,
            line: line_no,
            column,
            kind: NodeKind::Variable { value },
        });
    }

    fn recipe(&mut self, line_no: usize, line_start: usize, line: &str, sep: usize) {
        let Some((name, column)) = trimmed_name(line_start, &line[..sep]) else {
            self.error(line_no, sep, "malformed recipe");
            self.current_recipe = None;
            return;
        };

        let dependencies = token_spans(line_start + sep + 1, &line[sep + 1..]);

        self.nodes.push(Node {
            name,
            line: line_no,
            column,
            kind: NodeKind::Recipe {
                dependencies,
                body: Vec::new(),
            },
        });
        self.current_recipe = Some(self.nodes.len() - 1);
    }

    fn body_line(&mut self, line_no: usize, line_start: usize, line: &str) {
        let recipe = self
            .current_recipe
            .and_then(|idx| self.nodes.get_mut(idx))
            .map(|node| &mut node.kind);

        match recipe {
            Some(NodeKind::Recipe { body, .. }) => {
                if let Some(span) = Span::from_range(line_start..line_start + line.len()) {
                    body.push(span);
                }
            }
            _ => {
                let column = line.len() - line.trim_start().len();
                self.error(line_no, column, "command not inside recipe");
            }
        }
    }

    fn error(&mut self, line: usize, column: usize, message: &str) {
        log::trace!("parse error at {}:{}: {}", line, column, message);
        self.errors.push(ParseError {
            line,
            column,
            message: message.to_string(),
        });
    }
}

/// Span and column of `text` with surrounding whitespace removed.
fn trimmed_name(line_start: usize, text: &str) -> Option<(Span, usize)> {
    let leading = text.len() - text.trim_start().len();
    let name = text.trim();
    let span = Span::from_range(line_start + leading..line_start + leading + name.len())?;
    Some((span, leading))
}

/// Spans of the whitespace-delimited tokens in `text`.
fn token_spans(base: usize, text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut token_start = None;
    for (i, ch) in text.char_indices() {
        match (ch.is_whitespace(), token_start) {
            (true, Some(start)) => {
                spans.extend(Span::from_range(base + start..base + i));
                token_start = None;
            }
            (false, None) => token_start = Some(i),
            _ => {}
        }
    }
    if let Some(start) = token_start {
        spans.extend(Span::from_range(base + start..base + text.len()));
    }
    spans
}

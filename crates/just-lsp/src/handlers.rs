//
// handlers.rs
//
// Symbol resolution under the cursor and the definition/hover requests
//

use std::fmt;

use tower_lsp::lsp_types::{
    GotoDefinitionResponse, Hover, HoverContents, Location, MarkedString, Position, Range,
};
use url::Url;

use crate::document_store::Document;
use crate::index::SymbolIndex;
use crate::parser::{find_header_separator, Node};
use crate::state::WorldState;
use crate::utf16::{byte_to_utf16, utf16_to_byte};

// ============================================================================
// Cursor to symbol
// ============================================================================

/// Bytes that make up recipe and variable names
pub fn is_symbol_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Treat a cursor just past an identifier as being on it.
///
/// If `col` is on a non-symbol byte (or at end of line) and the byte before
/// it is a symbol byte, returns `col - 1`. Columns past the end clamp first.
pub fn snap_to_symbol(line: &str, col: usize) -> usize {
    let bytes = line.as_bytes();
    let col = col.min(bytes.len());
    let on_symbol = bytes.get(col).copied().is_some_and(is_symbol_byte);
    if !on_symbol && col > 0 && is_symbol_byte(bytes[col - 1]) {
        col - 1
    } else {
        col
    }
}

/// Half-open byte range of the identifier around `col`, or `None` when the
/// cursor touches no symbol bytes.
pub fn word_bounds(line: &str, col: usize) -> Option<(usize, usize)> {
    let bytes = line.as_bytes();
    let col = col.min(bytes.len());

    let mut start = col;
    while start > 0 && is_symbol_byte(bytes[start - 1]) {
        start -= 1;
    }
    let mut end = col;
    while end < bytes.len() && is_symbol_byte(bytes[end]) {
        end += 1;
    }

    (start < end).then_some((start, end))
}

/// Which definitions a symbol may refer to, given where it appears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupContext {
    /// Inside a `{{ ... }}` interpolation
    VariableOnly,
    /// After a recipe header's `:`, in the dependency list
    RecipeOnly,
    /// Anywhere else: recipes first, then variables
    RecipeThenVariable,
}

/// Classify the raw (unsnapped) cursor column on `line`.
pub fn classify_context(line: &str, col: usize) -> LookupContext {
    if inside_interpolation(line, col) {
        LookupContext::VariableOnly
    } else if find_header_separator(line).is_some_and(|sep| col > sep) {
        LookupContext::RecipeOnly
    } else {
        LookupContext::RecipeThenVariable
    }
}

/// Pairs the nearest `{{` before `col` with the first `}}` after it.
fn inside_interpolation(line: &str, col: usize) -> bool {
    let bytes = line.as_bytes();
    let col = col.min(bytes.len());

    let Some(open) = bytes[..col].windows(2).rposition(|w| w == b"{{") else {
        return false;
    };
    let inner = open + 2;
    bytes[inner..]
        .windows(2)
        .position(|w| w == b"}}")
        .is_some_and(|close| col <= inner + close)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Recipe,
    Variable,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Recipe => f.write_str("recipe"),
            SymbolKind::Variable => f.write_str("variable"),
        }
    }
}

/// A symbol under the cursor together with its definitions
#[derive(Debug)]
pub struct ResolvedSymbol<'a> {
    pub name: &'a str,
    pub kind: SymbolKind,
    pub definitions: &'a [Node],
    /// Range of the identifier under the cursor, in UTF-16 columns
    pub range: Range,
}

fn lookup<'a>(
    index: &'a SymbolIndex,
    name: &str,
    context: LookupContext,
) -> Option<(SymbolKind, &'a [Node])> {
    let recipes = || Some(index.recipes(name)).filter(|d| !d.is_empty());
    let variables = || Some(index.variables(name)).filter(|d| !d.is_empty());

    match context {
        LookupContext::VariableOnly => variables().map(|d| (SymbolKind::Variable, d)),
        LookupContext::RecipeOnly => recipes().map(|d| (SymbolKind::Recipe, d)),
        LookupContext::RecipeThenVariable => recipes()
            .map(|d| (SymbolKind::Recipe, d))
            .or_else(|| variables().map(|d| (SymbolKind::Variable, d))),
    }
}

/// Find the symbol at `position`.
///
/// With `follow_context` the lookup is restricted by [`classify_context`];
/// otherwise recipes are preferred over variables everywhere.
pub fn resolve_symbol(
    doc: &Document,
    position: Position,
    follow_context: bool,
) -> Option<ResolvedSymbol<'_>> {
    let line = doc.parse().line_text(position.line as usize)?;
    let raw_col = utf16_to_byte(line, position.character);
    let (start, end) = word_bounds(line, snap_to_symbol(line, raw_col))?;
    let name = &line[start..end];

    let context = if follow_context {
        classify_context(line, raw_col)
    } else {
        LookupContext::RecipeThenVariable
    };
    let (kind, definitions) = lookup(doc.index(), name, context)?;

    log::trace!("{:?} {:?} resolved as {}", context, name, kind);

    Some(ResolvedSymbol {
        name,
        kind,
        definitions,
        range: Range::new(
            Position::new(position.line, byte_to_utf16(line, start)),
            Position::new(position.line, byte_to_utf16(line, end)),
        ),
    })
}

/// Editor range of a definition's name
fn name_range(doc: &Document, node: &Node) -> Option<Range> {
    let parse = doc.parse();
    let line = parse.line_text(node.line)?;
    let line_start = parse.line_start(node.line)?;
    let start = node.name.start - line_start;
    let end = node.name.end + 1 - line_start;
    let line_no = node.line as u32;
    Some(Range::new(
        Position::new(line_no, byte_to_utf16(line, start)),
        Position::new(line_no, byte_to_utf16(line, end)),
    ))
}

// ============================================================================
// Requests
// ============================================================================

/// textDocument/definition. `None` (a null result) when the document is not
/// open, the position is out of range, or nothing matches.
pub fn goto_definition(
    state: &WorldState,
    uri: &Url,
    position: Position,
) -> Option<GotoDefinitionResponse> {
    let doc = state.documents.get(uri)?;
    let symbol = resolve_symbol(doc, position, true)?;

    let locations: Vec<Location> = symbol
        .definitions
        .iter()
        .filter_map(|node| name_range(doc, node))
        .map(|range| Location::new(uri.clone(), range))
        .collect();

    log::debug!(
        "Definition of {} {:?}: {} location(s)",
        symbol.kind,
        symbol.name,
        locations.len()
    );

    (!locations.is_empty()).then_some(GotoDefinitionResponse::Array(locations))
}

/// textDocument/hover. The contents are a plain `"<kind>: <name>"` tag and
/// the range covers the identifier under the cursor.
pub fn hover(state: &WorldState, uri: &Url, position: Position) -> Option<Hover> {
    let doc = state.documents.get(uri)?;
    let symbol = resolve_symbol(doc, position, state.config.hover_follows_context)?;

    Some(Hover {
        contents: HoverContents::Scalar(MarkedString::String(format!(
            "{}: {}",
            symbol.kind, symbol.name
        ))),
        range: Some(symbol.range),
    })
}

//
// document_store.rs
//
// Open documents with their parse results and symbol indices
//

use std::collections::HashMap;

use tower_lsp::lsp_types::TextDocumentContentChangeEvent;
use url::Url;

use crate::index::SymbolIndex;
use crate::parser::{self, ParseResult};

// ============================================================================
// Document
// ============================================================================

/// An open justfile.
///
/// The parse result and index are always rebuilt together from the full
/// text, so neither can be stale relative to the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub uri: Url,
    /// LSP document version
    pub version: i32,
    parse: ParseResult,
    index: SymbolIndex,
}

impl Document {
    pub fn new(uri: Url, version: i32, text: impl Into<String>) -> Self {
        let parse = parser::parse(text);
        let index = SymbolIndex::build(&parse);
        Self {
            uri,
            version,
            parse,
            index,
        }
    }

    pub fn text(&self) -> &str {
        self.parse.source()
    }

    pub fn parse(&self) -> &ParseResult {
        &self.parse
    }

    pub fn index(&self) -> &SymbolIndex {
        &self.index
    }
}

// ============================================================================
// Document Store
// ============================================================================

/// Table of open documents keyed by URI
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: HashMap<Url, Document>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the entry for `uri`.
    pub fn open(&mut self, uri: Url, version: i32, text: String) {
        let document = Document::new(uri.clone(), version, text);
        log::debug!(
            "Opened {} (version {}): {} definitions, {} parse errors",
            uri,
            version,
            document.parse().nodes().len(),
            document.parse().errors().len()
        );
        self.documents.insert(uri, document);
    }

    /// Replace the text of `uri` with the first change entry.
    ///
    /// Only full-document sync is supported, so any range on the change is
    /// ignored. Returns `false` and leaves the store untouched when there are
    /// no changes.
    pub fn change(
        &mut self,
        uri: Url,
        version: i32,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) -> bool {
        let Some(change) = changes.into_iter().next() else {
            log::debug!("Ignoring empty change for {}", uri);
            return false;
        };
        if change.range.is_some() {
            log::debug!("Treating ranged change for {} as a full replacement", uri);
        }
        if !self.documents.contains_key(&uri) {
            log::debug!("Change for unopened document {}; creating it", uri);
        }
        self.open(uri, version, change.text);
        true
    }

    pub fn close(&mut self, uri: &Url) -> bool {
        let removed = self.documents.remove(uri).is_some();
        if removed {
            log::debug!("Closed {}", uri);
        }
        removed
    }

    pub fn get(&self, uri: &Url) -> Option<&Document> {
        self.documents.get(uri)
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.documents.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Url {
        Url::parse("file:///project/justfile").unwrap()
    }

    fn full_change(text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn open_parses_and_indexes() {
        let mut store = DocumentStore::new();
        store.open(uri(), 1, "build:\n\techo\n".to_string());
        let doc = store.get(&uri()).unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.index().recipes("build").len(), 1);
    }

    #[test]
    fn change_replaces_text_and_version() {
        let mut store = DocumentStore::new();
        store.open(uri(), 1, "a:\n".to_string());
        assert!(store.change(uri(), 2, vec![full_change("b:\n"), full_change("c:\n")]));
        let doc = store.get(&uri()).unwrap();
        assert_eq!(doc.text(), "b:\n");
        assert_eq!(doc.version, 2);
        assert!(doc.index().recipes("a").is_empty());
        assert_eq!(doc.index().recipes("b").len(), 1);
    }

    #[test]
    fn empty_change_is_a_no_op() {
        let mut store = DocumentStore::new();
        store.open(uri(), 1, "x := 1\n".to_string());
        let before = store.get(&uri()).unwrap().clone();
        assert!(!store.change(uri(), 7, Vec::new()));
        assert_eq!(store.get(&uri()).unwrap(), &before);
    }

    #[test]
    fn close_removes_entry() {
        let mut store = DocumentStore::new();
        store.open(uri(), 1, String::new());
        assert!(store.close(&uri()));
        assert!(!store.close(&uri()));
        assert!(store.is_empty());
    }
}

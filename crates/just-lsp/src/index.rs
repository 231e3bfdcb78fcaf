//
// index.rs
//
// Name to definition maps built from a parse result
//

use std::collections::HashMap;

use crate::parser::{Node, ParseResult};

/// Recipe and variable definitions keyed by name.
///
/// Duplicate names keep every definition in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolIndex {
    recipes: HashMap<String, Vec<Node>>,
    variables: HashMap<String, Vec<Node>>,
}

impl SymbolIndex {
    pub fn build(parse: &ParseResult) -> Self {
        let mut index = Self::default();
        for node in parse.nodes() {
            let name = node.name_text(parse.source());
            if name.is_empty() {
                continue;
            }
            let map = if node.is_recipe() {
                &mut index.recipes
            } else {
                &mut index.variables
            };
            map.entry(name.to_string()).or_default().push(node.clone());
        }
        log::trace!(
            "indexed {} recipe names and {} variable names",
            index.recipes.len(),
            index.variables.len()
        );
        index
    }

    pub fn recipes(&self, name: &str) -> &[Node] {
        self.recipes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn variables(&self, name: &str) -> &[Node] {
        self.variables.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn recipe_names(&self) -> impl Iterator<Item = &str> {
        self.recipes.keys().map(String::as_str)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }
}

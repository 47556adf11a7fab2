//! Symbol scopes
//!
//! Scopes are stored in an arena and linked to their parent. Lookups fall
//! through to the parent chain unless told otherwise.

use std::collections::HashMap;

use crate::frontend::ast::NodeId;
use crate::utils::{Error, Position, Result};

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// A scope containing symbols
#[derive(Debug)]
struct SymbolScope {
    parent: Option<ScopeId>,
    symbols: HashMap<String, NodeId>,
}

/// All scopes created during one analysis run
#[derive(Debug)]
pub struct ScopeTable {
    scopes: Vec<SymbolScope>,
}

impl ScopeTable {
    /// Create a table holding only the root scope
    pub fn new() -> Self {
        Self {
            scopes: vec![SymbolScope {
                parent: None,
                symbols: HashMap::new(),
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Open a new scope below `parent`
    pub fn create(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(SymbolScope {
            parent: Some(parent),
            symbols: HashMap::new(),
        });
        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    /// Bind `name` in `scope`. Only this scope is checked for an existing
    /// binding.
    pub fn add(&mut self, scope: ScopeId, name: &str, node: NodeId, pos: Position) -> Result<()> {
        let symbols = &mut self.scopes[scope.0].symbols;
        if symbols.contains_key(name) {
            return Err(Error::SymbolAlreadyDefined {
                name: name.to_string(),
                pos,
            });
        }
        symbols.insert(name.to_string(), node);
        Ok(())
    }

    pub fn contains(&self, scope: ScopeId, name: &str, check_parents: bool) -> bool {
        self.find(scope, name, check_parents).is_some()
    }

    /// Look up `name`, optionally walking up the parent chain
    pub fn find(&self, scope: ScopeId, name: &str, check_parents: bool) -> Option<NodeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(node) = scope.symbols.get(name) {
                return Some(*node);
            }
            if !check_parents {
                break;
            }
            current = scope.parent;
        }
        None
    }

    /// Look up `name` in `scope` and its ancestors
    pub fn get(&self, scope: ScopeId, name: &str) -> Option<NodeId> {
        self.find(scope, name, true)
    }

    /// Number of scopes, the root included
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_falls_through_to_parent() {
        let mut table = ScopeTable::new();
        let root = table.root();
        let inner = table.create(root);
        table.add(root, "a", NodeId::new(10), Position::new(1, 1)).unwrap();

        assert_eq!(table.get(inner, "a"), Some(NodeId::new(10)));
        assert!(table.contains(inner, "a", true));
        assert!(!table.contains(inner, "a", false));
        assert_eq!(table.parent(inner), Some(root));
    }

    #[test]
    fn test_add_checks_only_local_scope() {
        let mut table = ScopeTable::new();
        let root = table.root();
        let inner = table.create(root);
        table.add(root, "a", NodeId::new(10), Position::new(1, 1)).unwrap();

        assert!(table.add(inner, "a", NodeId::new(11), Position::new(2, 1)).is_ok());
        assert_eq!(table.get(inner, "a"), Some(NodeId::new(11)));

        let err = table.add(inner, "a", NodeId::new(12), Position::new(3, 5)).unwrap_err();
        assert_eq!(
            err,
            Error::SymbolAlreadyDefined {
                name: "a".to_string(),
                pos: Position::new(3, 5)
            }
        );
    }

    #[test]
    fn test_sibling_scopes_are_isolated() {
        let mut table = ScopeTable::new();
        let root = table.root();
        let left = table.create(root);
        let right = table.create(root);
        table.add(left, "x", NodeId::new(4), Position::new(1, 1)).unwrap();

        assert_eq!(table.get(right, "x"), None);
        assert_eq!(table.len(), 3);
    }
}

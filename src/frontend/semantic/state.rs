//! State shared by the semantic analysis passes of one run

use std::collections::HashMap;

use crate::frontend::ast::{Ast, AstNodeKind, NodeId};
use crate::frontend::semantic::scope::{ScopeId, ScopeTable};
use crate::types::{TupleMember, TypeId};

/// Analyzed modules, by name. Roots live in the same [`Ast`] arena.
pub type ModuleMap = HashMap<String, NodeId>;

/// Module whose exports are visible in every script
pub const RUNTIME_MODULE: &str = "runtime";

pub struct AnalysisState<'a> {
    pub ast: &'a mut Ast,
    pub scopes: ScopeTable,
    node_scopes: HashMap<NodeId, ScopeId>,
    parents: Vec<NodeId>,
    modules: &'a ModuleMap,
    tuple_interner: HashMap<Vec<TypeId>, TypeId>,
}

impl<'a> AnalysisState<'a> {
    /// Create the state of a new run. The root scope holds the built-in
    /// type names.
    pub fn new(ast: &'a mut Ast, modules: &'a ModuleMap) -> Self {
        let mut scopes = ScopeTable::new();
        let root = scopes.root();
        for (name, node) in ast.builtin_types() {
            // Fresh root scope: names cannot collide
            let _ = scopes.add(root, name, node, ast.pos(node));
        }

        Self {
            ast,
            scopes,
            node_scopes: HashMap::new(),
            parents: Vec::new(),
            modules,
            tuple_interner: HashMap::new(),
        }
    }

    pub fn root_scope(&self) -> ScopeId {
        self.scopes.root()
    }

    // ==================== Node scopes ====================

    pub fn set_scope(&mut self, node: NodeId, scope: ScopeId) {
        self.node_scopes.insert(node, scope);
    }

    /// Scope that applies at `node`. Nodes created after scope creation
    /// (adapters and the like) resolve in the root scope.
    pub fn scope_of(&self, node: NodeId) -> ScopeId {
        self.node_scopes
            .get(&node)
            .copied()
            .unwrap_or_else(|| self.scopes.root())
    }

    /// Resolve `name` from `scope`. With `solve_alias`, typedefs are
    /// followed to the node they name until a non-alias node is reached.
    pub fn get_symbol(&self, scope: ScopeId, name: &str, solve_alias: bool) -> Option<NodeId> {
        let mut node = self.scopes.get(scope, name)?;
        if !solve_alias {
            return Some(node);
        }

        let mut steps = 0;
        while self.ast.kind(node) == AstNodeKind::Typedef {
            let target = self.ast.child(node, 0)?;
            node = if self.ast.kind(target) == AstNodeKind::TypeName {
                match self.ast.reference(target) {
                    Some(resolved) => resolved,
                    None => self.scopes.get(self.scope_of(target), self.ast.name(target))?,
                }
            } else {
                target
            };

            // Cyclic aliases never reach a type
            steps += 1;
            if steps > self.ast.len() {
                return None;
            }
        }
        Some(node)
    }

    // ==================== Parent stack ====================

    pub fn push_parent(&mut self, node: NodeId) {
        self.parents.push(node);
    }

    pub fn pop_parent(&mut self) {
        self.parents.pop();
    }

    /// Ancestor `level` steps up; 0 is the innermost one
    pub fn parent(&self, level: usize) -> Option<NodeId> {
        self.parents.iter().rev().nth(level).copied()
    }

    /// Ancestors from the innermost outward
    pub fn parents(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.parents.iter().rev().copied()
    }

    /// Innermost ancestor of the given kind
    pub fn find_parent(&self, kind: AstNodeKind) -> Option<NodeId> {
        self.parents().find(|p| self.ast.kind(*p) == kind)
    }

    // ==================== Modules ====================

    pub fn module(&self, name: &str) -> Option<NodeId> {
        self.modules.get(name).copied()
    }

    // ==================== Types ====================

    /// Anonymous tuple type with the given member types. The same member
    /// list always yields the same type within one run.
    pub fn intern_tuple(&mut self, members: Vec<TypeId>) -> TypeId {
        if members.is_empty() {
            return TypeId::VOID;
        }
        if let Some(ty) = self.tuple_interner.get(&members) {
            return *ty;
        }

        let tuple_members = members.iter().copied().map(TupleMember::unnamed).collect();
        let ty = self.ast.types_mut().tuple(tuple_members, None);
        self.tuple_interner.insert(members, ty);
        ty
    }

    pub fn type_string(&self, ty: TypeId) -> String {
        self.ast.types().display(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::AstNode;
    use crate::utils::Position;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_root_scope_has_builtins() {
        let mut ast = Ast::new();
        let modules = ModuleMap::new();
        let state = AnalysisState::new(&mut ast, &modules);
        let root = state.root_scope();

        assert_eq!(state.get_symbol(root, "int", true), Some(Ast::BUILTIN_INT));
        assert_eq!(state.get_symbol(root, "bool", false), Some(Ast::BUILTIN_BOOL));
        assert_eq!(state.get_symbol(root, "c_pointer", true), Some(Ast::BUILTIN_C_POINTER));
        assert_eq!(state.get_symbol(root, "float", true), None);
    }

    #[test]
    fn test_interned_tuples_share_identity() {
        let mut ast = Ast::new();
        let modules = ModuleMap::new();
        let mut state = AnalysisState::new(&mut ast, &modules);

        let a = state.intern_tuple(vec![TypeId::INT, TypeId::BOOL]);
        let b = state.intern_tuple(vec![TypeId::INT, TypeId::BOOL]);
        let c = state.intern_tuple(vec![TypeId::BOOL, TypeId::INT]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(state.intern_tuple(vec![]), TypeId::VOID);
        assert_eq!(state.intern_tuple(Vec::new()), state.intern_tuple(vec![]));
    }

    #[test]
    fn test_alias_solving_follows_typedef_chain() {
        let mut ast = Ast::new();
        let first = ast.add(AstNode::new(AstNodeKind::TypeName, Position::new(1, 17)).with_name("int"));
        let integer = ast.add(
            AstNode::new(AstNodeKind::Typedef, Position::new(1, 1))
                .with_name("integer")
                .with_children(vec![Some(first)]),
        );
        let second = ast.add(AstNode::new(AstNodeKind::TypeName, Position::new(2, 17)).with_name("integer"));
        let number = ast.add(
            AstNode::new(AstNodeKind::Typedef, Position::new(2, 1))
                .with_name("number")
                .with_children(vec![Some(second)]),
        );

        let modules = ModuleMap::new();
        let mut state = AnalysisState::new(&mut ast, &modules);
        let root = state.root_scope();
        state.scopes.add(root, "integer", integer, Position::new(1, 1)).unwrap();
        state.scopes.add(root, "number", number, Position::new(2, 1)).unwrap();

        assert_eq!(state.get_symbol(root, "number", false), Some(number));
        assert_eq!(state.get_symbol(root, "number", true), Some(Ast::BUILTIN_INT));
    }

    #[test]
    fn test_parent_stack() {
        let mut ast = Ast::new();
        let func = ast.add(AstNode::new(AstNodeKind::Function, Position::new(1, 1)));
        let block = ast.add(AstNode::new(AstNodeKind::Block, Position::new(1, 10)));
        let modules = ModuleMap::new();
        let mut state = AnalysisState::new(&mut ast, &modules);

        state.push_parent(func);
        state.push_parent(block);
        assert_eq!(state.parent(0), Some(block));
        assert_eq!(state.parent(1), Some(func));
        assert_eq!(state.find_parent(AstNodeKind::Function), Some(func));
        state.pop_parent();
        state.pop_parent();
        assert_eq!(state.parent(0), None);
    }
}

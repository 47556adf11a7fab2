//! Pass framework
//!
//! A pass is a table of per-node-kind operations plus a walk order. Each
//! node kind has a list of checks, which validate and annotate, and a list
//! of transforms, which may return a replacement node. Transforms only run
//! when every check of the node succeeded.

use std::collections::HashMap;

use crate::frontend::ast::{AstNodeKind, NodeId};
use crate::frontend::semantic::state::AnalysisState;
use crate::utils::{Error, Result};

/// Outcome of walking a subtree: the (possibly replaced) node, or every
/// error found in it
pub type SemanticResult = std::result::Result<NodeId, Vec<Error>>;

pub type CheckFn = fn(&mut AnalysisState<'_>, NodeId) -> Result<()>;
pub type TransformFn = fn(&mut AnalysisState<'_>, NodeId) -> NodeId;

/// Operations applied to one node kind
#[derive(Default, Clone)]
pub struct NodeOperations {
    pub checks: Vec<CheckFn>,
    pub transforms: Vec<TransformFn>,
}

impl NodeOperations {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn checks(checks: Vec<CheckFn>) -> Self {
        Self {
            checks,
            transforms: Vec::new(),
        }
    }

    pub fn with_transforms(mut self, transforms: Vec<TransformFn>) -> Self {
        self.transforms = transforms;
        self
    }
}

/// Dispatch table of one pass
pub struct PassOperations {
    name: &'static str,
    table: HashMap<AstNodeKind, NodeOperations>,
}

impl PassOperations {
    /// Build the table by asking `operations` about every node kind
    pub fn new(name: &'static str, operations: fn(AstNodeKind) -> NodeOperations) -> Self {
        let table = AstNodeKind::ALL
            .iter()
            .map(|kind| (*kind, operations(*kind)))
            .collect();
        Self { name, table }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the checks of `node`, then its transforms if all checks passed
    pub fn process_node(&self, state: &mut AnalysisState<'_>, node: NodeId) -> SemanticResult {
        let Some(ops) = self.table.get(&state.ast.kind(node)) else {
            return Ok(node);
        };

        let errors: Vec<Error> = ops
            .checks
            .iter()
            .filter_map(|check| check(state, node).err())
            .collect();
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ops.transforms.iter().fold(node, |current, transform| transform(state, current)))
    }
}

/// Walk leaves first: children are processed (and replaced) before their
/// parent. Errors of every child are collected and merged with the
/// parent's own result.
pub fn walk_leaves_first(ops: &PassOperations, state: &mut AnalysisState<'_>, node: NodeId) -> SemanticResult {
    let mut errors = Vec::new();

    state.push_parent(node);
    for (index, child) in state.ast.walkable_children(node) {
        match walk_leaves_first(ops, state, child) {
            Ok(replacement) => {
                if replacement != child {
                    state.ast.set_child(node, index, Some(replacement));
                }
            }
            Err(mut child_errors) => errors.append(&mut child_errors),
        }
    }
    state.pop_parent();

    let result = ops.process_node(state, node);
    if errors.is_empty() {
        return result;
    }
    if let Err(mut own) = result {
        errors.append(&mut own);
    }
    Err(errors)
}

/// Walk root first: a node is processed before its children, which are
/// then walked below the (possibly replaced) node.
pub fn walk_root_first(ops: &PassOperations, state: &mut AnalysisState<'_>, node: NodeId) -> SemanticResult {
    let mut errors = Vec::new();

    let current = match ops.process_node(state, node) {
        Ok(replacement) => replacement,
        Err(mut own) => {
            errors.append(&mut own);
            node
        }
    };

    state.push_parent(current);
    for (index, child) in state.ast.walkable_children(current) {
        match walk_root_first(ops, state, child) {
            Ok(replacement) => {
                if replacement != child {
                    state.ast.set_child(current, index, Some(replacement));
                }
            }
            Err(mut child_errors) => errors.append(&mut child_errors),
        }
    }
    state.pop_parent();

    if errors.is_empty() {
        Ok(current)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::{Ast, AstNode};
    use crate::frontend::semantic::state::ModuleMap;
    use crate::utils::Position;
    use pretty_assertions::assert_eq;

    fn reject_integers(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
        Err(Error::NotImplemented {
            feature: format!("integer {}", state.ast.node(node).value),
            pos: state.ast.pos(node),
        })
    }

    fn wrap_in_adapter(state: &mut AnalysisState<'_>, node: NodeId) -> NodeId {
        let pos = state.ast.pos(node);
        state
            .ast
            .add(AstNode::new(AstNodeKind::TupleAdapter, pos).with_children(vec![Some(node)]))
    }

    fn always_fail(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
        Err(Error::ReturnOutsideFunction { pos: state.ast.pos(node) })
    }

    fn test_operations(kind: AstNodeKind) -> NodeOperations {
        match kind {
            AstNodeKind::Integer => NodeOperations::checks(vec![reject_integers]),
            AstNodeKind::Identifier => NodeOperations::none().with_transforms(vec![wrap_in_adapter]),
            AstNodeKind::Return => NodeOperations::checks(vec![always_fail]).with_transforms(vec![wrap_in_adapter]),
            _ => NodeOperations::none(),
        }
    }

    fn sample_tree(ast: &mut Ast) -> (NodeId, NodeId) {
        let one = ast.add(AstNode::new(AstNodeKind::Integer, Position::new(1, 2)).with_value("1"));
        let name = ast.add(AstNode::new(AstNodeKind::Identifier, Position::new(1, 5)).with_name("x"));
        let two = ast.add(AstNode::new(AstNodeKind::Integer, Position::new(1, 8)).with_value("2"));
        let tuple = ast.add(
            AstNode::new(AstNodeKind::Tuple, Position::new(1, 1)).with_children(vec![Some(one), Some(name), Some(two)]),
        );
        (tuple, name)
    }

    #[test]
    fn test_errors_of_all_children_are_collected() {
        let mut ast = Ast::new();
        let (tuple, _) = sample_tree(&mut ast);
        let modules = ModuleMap::new();
        let mut state = AnalysisState::new(&mut ast, &modules);
        let ops = PassOperations::new("test", test_operations);

        let errors = walk_leaves_first(&ops, &mut state, tuple).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].position(), Some(Position::new(1, 2)));
        assert_eq!(errors[1].position(), Some(Position::new(1, 8)));
    }

    #[test]
    fn test_transforms_replace_child_slots() {
        let mut ast = Ast::new();
        let name = ast.add(AstNode::new(AstNodeKind::Identifier, Position::new(1, 2)).with_name("x"));
        let tuple = ast.add(AstNode::new(AstNodeKind::Tuple, Position::new(1, 1)).with_children(vec![Some(name)]));
        let modules = ModuleMap::new();
        let mut state = AnalysisState::new(&mut ast, &modules);
        let ops = PassOperations::new("test", test_operations);

        assert_eq!(walk_leaves_first(&ops, &mut state, tuple), Ok(tuple));
        let adapter = state.ast.child(tuple, 0).unwrap();
        assert_eq!(state.ast.kind(adapter), AstNodeKind::TupleAdapter);
        assert_eq!(state.ast.child(adapter, 0), Some(name));
    }

    #[test]
    fn test_failed_check_skips_transform() {
        let mut ast = Ast::new();
        let ret = ast.add(AstNode::new(AstNodeKind::Return, Position::new(3, 1)));
        let block = ast.add(AstNode::new(AstNodeKind::Block, Position::new(2, 1)).with_children(vec![Some(ret)]));
        let modules = ModuleMap::new();
        let mut state = AnalysisState::new(&mut ast, &modules);
        let ops = PassOperations::new("test", test_operations);

        let errors = walk_root_first(&ops, &mut state, block).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(state.ast.child(block, 0), Some(ret));
    }

    #[test]
    fn test_root_first_visits_parent_before_children() {
        let mut ast = Ast::new();
        let (tuple, name) = sample_tree(&mut ast);
        let modules = ModuleMap::new();
        let mut state = AnalysisState::new(&mut ast, &modules);
        let ops = PassOperations::new("test", test_operations);

        let errors = walk_root_first(&ops, &mut state, tuple).unwrap_err();
        assert_eq!(errors.len(), 2);
        // The identifier was still wrapped even though its siblings failed
        let wrapped = state.ast.child(tuple, 1).unwrap();
        assert_eq!(state.ast.child(wrapped, 0), Some(name));
    }
}

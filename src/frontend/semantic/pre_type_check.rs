//! Pre-type-check pass (leaves first)
//!
//! Rejects declarations that refer to themselves before any type is
//! computed, and collapses typedefs of tuple definitions.

use crate::frontend::ast::{AstNodeKind, NodeId};
use crate::frontend::semantic::state::AnalysisState;
use crate::frontend::semantic::walk::{walk_leaves_first, NodeOperations, PassOperations, SemanticResult};
use crate::utils::{Error, Result};

pub fn run(state: &mut AnalysisState<'_>, root: NodeId) -> SemanticResult {
    let ops = PassOperations::new("pre type check", operations);
    walk_leaves_first(&ops, state, root)
}

fn operations(kind: AstNodeKind) -> NodeOperations {
    match kind {
        AstNodeKind::Identifier => NodeOperations::checks(vec![recursive_symbol_reference_check]),
        AstNodeKind::Typedef => NodeOperations::none().with_transforms(vec![tuple_remove_typedef]),
        AstNodeKind::Module
        | AstNodeKind::Script
        | AstNodeKind::Block
        | AstNodeKind::Tuple
        | AstNodeKind::TupleDef
        | AstNodeKind::TupleAdapter
        | AstNodeKind::Declaration
        | AstNodeKind::If
        | AstNodeKind::For
        | AstNodeKind::Return
        | AstNodeKind::Function
        | AstNodeKind::FunctionType
        | AstNodeKind::Assignment
        | AstNodeKind::Call
        | AstNodeKind::CtCall
        | AstNodeKind::Integer
        | AstNodeKind::Float
        | AstNodeKind::Str
        | AstNodeKind::Bool
        | AstNodeKind::MemberAccess
        | AstNodeKind::MemberName
        | AstNodeKind::BinaryOp
        | AstNodeKind::PrefixOp
        | AstNodeKind::PostfixOp
        | AstNodeKind::Actor
        | AstNodeKind::TypeName
        | AstNodeKind::DefaultType
        | AstNodeKind::Input
        | AstNodeKind::Output
        | AstNodeKind::MessageType
        | AstNodeKind::UnnamedInput
        | AstNodeKind::Import
        | AstNodeKind::GetAddress
        | AstNodeKind::ArrayDecl
        | AstNodeKind::Select => NodeOperations::none(),
    }
}

/// An identifier must not resolve to one of its own ancestors.
///
/// An actor called from inside its own body is reported as a recursive
/// actor instance.
fn recursive_symbol_reference_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let name = state.ast.name(node);
    let scope = state.scope_of(node);
    let Some(symbol) = state.get_symbol(scope, name, false) else {
        // Unknown names are reported by the type check
        return Ok(());
    };
    if !state.parents().any(|p| p == symbol) {
        return Ok(());
    }

    let pos = state.ast.pos(node);
    let is_callee = state
        .parent(0)
        .map_or(false, |p| state.ast.kind(p) == AstNodeKind::Call && state.ast.child(p, 0) == Some(node));
    if is_callee && state.ast.kind(symbol) == AstNodeKind::Actor {
        return Err(Error::RecursiveActorInstance { name: name.to_string(), pos });
    }
    Err(Error::RecursiveSymbolReference { name: name.to_string(), pos })
}

/// `type P is (x: int)` becomes the tuple definition itself, named `P`
fn tuple_remove_typedef(state: &mut AnalysisState<'_>, node: NodeId) -> NodeId {
    let Some(target) = state.ast.child(node, 0) else {
        return node;
    };
    if state.ast.kind(target) != AstNodeKind::TupleDef {
        return node;
    }

    let name = state.ast.name(node).to_string();
    log::trace!("typedef '{}' collapsed into its tuple definition", name);
    state.ast.node_mut(target).name = name;

    // Export slots of the module are not walked
    if let Some(module) = state.find_parent(AstNodeKind::Module) {
        let slots: Vec<usize> = state
            .ast
            .children(module)
            .iter()
            .enumerate()
            .filter(|(_, child)| **child == Some(node))
            .map(|(index, _)| index)
            .collect();
        for index in slots {
            state.ast.set_child(module, index, Some(target));
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::Ast;
    use crate::frontend::parser::parse_script;
    use crate::frontend::semantic::state::ModuleMap;
    use crate::frontend::semantic::{gather, scope_creation};
    use pretty_assertions::assert_eq;

    fn run_until_pre_type_check(ast: &mut Ast, source: &str) -> (NodeId, std::result::Result<NodeId, Vec<Error>>) {
        let script = parse_script(source, "test", ast).unwrap();
        let modules = ModuleMap::new();
        let mut state = AnalysisState::new(ast, &modules);
        scope_creation::run(&mut state, script).unwrap();
        gather::run(&mut state, script).unwrap();
        let result = run(&mut state, script);
        (script, result)
    }

    #[test]
    fn test_self_referencing_constant() {
        let mut ast = Ast::new();
        let (_, result) = run_until_pre_type_check(&mut ast, "const a = a + 1");
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], Error::RecursiveSymbolReference { name, .. } if name == "a"));
    }

    #[test]
    fn test_references_to_other_declarations_pass() {
        let mut ast = Ast::new();
        let (_, result) = run_until_pre_type_check(&mut ast, "const a = 1\n const b = a + 1\n function f(x: int) { x + b }");
        assert!(result.is_ok());
    }

    #[test]
    fn test_actor_instantiating_itself() {
        let mut ast = Ast::new();
        let (_, result) = run_until_pre_type_check(&mut ast, "actor A() { const inner = A() }");
        let errors = result.unwrap_err();
        assert!(matches!(&errors[0], Error::RecursiveActorInstance { name, .. } if name == "A"));
    }

    #[test]
    fn test_tuple_typedef_is_collapsed() {
        let mut ast = Ast::new();
        let (script, result) = run_until_pre_type_check(&mut ast, "type Point is (x: int, y: int)\n type Count is int");
        assert!(result.is_ok());

        let point = ast.child(script, 0).unwrap();
        assert_eq!(ast.kind(point), AstNodeKind::TupleDef);
        assert_eq!(ast.name(point), "Point");

        let count = ast.child(script, 1).unwrap();
        assert_eq!(ast.kind(count), AstNodeKind::Typedef);
    }
}

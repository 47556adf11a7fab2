//! Symbol gather pass (root first)
//!
//! Registers every named declaration in the scope of its container and
//! makes imported and runtime symbols visible.

use crate::frontend::ast::{AstFlags, AstNodeKind, NodeId};
use crate::frontend::module::exported_symbols;
use crate::frontend::semantic::scope::ScopeId;
use crate::frontend::semantic::state::{AnalysisState, RUNTIME_MODULE};
use crate::frontend::semantic::walk::{walk_root_first, NodeOperations, PassOperations, SemanticResult};
use crate::utils::{Error, Result};

pub fn run(state: &mut AnalysisState<'_>, root: NodeId) -> SemanticResult {
    let ops = PassOperations::new("symbol gather", operations);
    walk_root_first(&ops, state, root)
}

fn operations(kind: AstNodeKind) -> NodeOperations {
    match kind {
        AstNodeKind::Module => NodeOperations::checks(vec![gather_module_exports]),
        AstNodeKind::Script => NodeOperations::checks(vec![import_runtime_symbols]),
        AstNodeKind::Import => NodeOperations::checks(vec![import_module_symbols]),
        AstNodeKind::Declaration => {
            NodeOperations::checks(vec![gather_symbol, gather_parameter]).with_transforms(vec![default_to_const])
        }
        AstNodeKind::Function
        | AstNodeKind::Typedef
        | AstNodeKind::Actor
        | AstNodeKind::Input
        | AstNodeKind::Output => NodeOperations::checks(vec![gather_symbol]),
        AstNodeKind::Block
        | AstNodeKind::Tuple
        | AstNodeKind::TupleDef
        | AstNodeKind::TupleAdapter
        | AstNodeKind::If
        | AstNodeKind::For
        | AstNodeKind::Return
        | AstNodeKind::FunctionType
        | AstNodeKind::Assignment
        | AstNodeKind::Call
        | AstNodeKind::CtCall
        | AstNodeKind::Integer
        | AstNodeKind::Float
        | AstNodeKind::Str
        | AstNodeKind::Bool
        | AstNodeKind::Identifier
        | AstNodeKind::MemberAccess
        | AstNodeKind::MemberName
        | AstNodeKind::BinaryOp
        | AstNodeKind::PrefixOp
        | AstNodeKind::PostfixOp
        | AstNodeKind::TypeName
        | AstNodeKind::DefaultType
        | AstNodeKind::MessageType
        | AstNodeKind::UnnamedInput
        | AstNodeKind::GetAddress
        | AstNodeKind::ArrayDecl
        | AstNodeKind::Select => NodeOperations::none(),
    }
}

/// Bind `name` to `node` in `scope`. With `check_parents`, a binding in an
/// enclosing scope is a collision too. Registering the very same node
/// again is not.
fn register(state: &mut AnalysisState<'_>, scope: ScopeId, name: &str, node: NodeId, check_parents: bool) -> Result<()> {
    match state.scopes.find(scope, name, check_parents) {
        Some(existing) if existing == node => Ok(()),
        Some(_) => Err(Error::SymbolAlreadyDefined {
            name: name.to_string(),
            pos: state.ast.pos(node),
        }),
        None => {
            log::trace!("register '{}' -> {:?}", name, node);
            state.scopes.add(scope, name, node, state.ast.pos(node))
        }
    }
}

fn register_exports(state: &mut AnalysisState<'_>, scope: ScopeId, module: NodeId) -> Result<()> {
    for (name, node) in exported_symbols(state.ast, module) {
        register(state, scope, &name, node, true)?;
    }
    Ok(())
}

/// Named nodes go into the scope of their container. Tuple members only
/// collide with their siblings.
fn gather_symbol(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let name = state.ast.name(node).to_string();
    if name.is_empty() {
        return Ok(());
    }
    let Some(container) = state.parent(0) else {
        return Ok(());
    };

    let scope = state.scope_of(container);
    let check_parents = state.ast.kind(container) != AstNodeKind::TupleDef;
    register(state, scope, &name, node, check_parents)
}

/// Parameters are also visible in the body of their owner, and must not
/// shadow anything visible there
fn gather_parameter(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    if !state.ast.flags(node).contains(AstFlags::FUNCTION_PARAMETER) {
        return Ok(());
    }
    let (Some(list), Some(owner)) = (state.parent(0), state.parent(1)) else {
        return Ok(());
    };
    let owns_parameters = matches!(
        state.ast.kind(owner),
        AstNodeKind::Function | AstNodeKind::Input | AstNodeKind::Actor | AstNodeKind::UnnamedInput
    );
    if state.ast.kind(list) != AstNodeKind::TupleDef || !owns_parameters {
        return Ok(());
    }

    let name = state.ast.name(node).to_string();
    let scope = state.scope_of(owner);
    register(state, scope, &name, node, true)
}

fn default_to_const(state: &mut AnalysisState<'_>, node: NodeId) -> NodeId {
    let flags = &mut state.ast.node_mut(node).flags;
    if !flags.contains(AstFlags::VAR) {
        flags.insert(AstFlags::CONST);
    }
    node
}

/// Exports of every script of a module are visible to its sibling scripts
fn gather_module_exports(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let scope = state.scope_of(node);
    register_exports(state, scope, node)
}

fn import_runtime_symbols(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let Some(runtime) = state.module(RUNTIME_MODULE) else {
        return Ok(());
    };
    let scope = state.scope_of(node);
    register_exports(state, scope, runtime)
}

fn import_module_symbols(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    if state.ast.flags(node).contains(AstFlags::EXTERN_C) {
        return Ok(());
    }

    let module_name = state.ast.node(node).value.clone();
    let module = state.module(&module_name).ok_or_else(|| Error::UnknownModule {
        name: module_name.clone(),
        pos: state.ast.pos(node),
    })?;
    state.ast.set_reference(node, Some(module));

    let Some(container) = state.parent(0) else {
        return Ok(());
    };
    let scope = state.scope_of(container);
    register_exports(state, scope, module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::Ast;
    use crate::frontend::parser::parse_script;
    use crate::frontend::semantic::scope_creation;
    use crate::frontend::semantic::state::ModuleMap;
    use pretty_assertions::assert_eq;

    /// Parse and run the passes up to symbol gathering
    fn gather(source: &str) -> std::result::Result<(), Vec<Error>> {
        let mut ast = Ast::new();
        let script = parse_script(source, "test", &mut ast).map_err(|e| vec![e])?;
        let modules = ModuleMap::new();
        let mut state = AnalysisState::new(&mut ast, &modules);
        scope_creation::run(&mut state, script)?;
        run(&mut state, script).map(|_| ())
    }

    fn first_error(source: &str) -> Error {
        gather(source).unwrap_err().remove(0)
    }

    #[test]
    fn test_duplicate_constant() {
        let err = first_error("const a = 7\n const a = 10");
        assert!(matches!(err, Error::SymbolAlreadyDefined { ref name, .. } if name == "a"));
        assert_eq!(err.position().map(|p| p.line), Some(2));
    }

    #[test]
    fn test_anonymous_function() {
        assert!(gather("const f = function (a: int, b: int) { a + b }").is_ok());
    }

    #[test]
    fn test_local_shadows_parameter() {
        let err = first_error("function test(a: int, b: int) { const a = 3; }");
        assert!(matches!(err, Error::SymbolAlreadyDefined { ref name, .. } if name == "a"));
    }

    #[test]
    fn test_parameter_shadows_global() {
        let err = first_error("const a = 7\n function test(a: int) { a * 2 }");
        assert!(matches!(err, Error::SymbolAlreadyDefined { ref name, .. } if name == "a"));
    }

    #[test]
    fn test_sibling_parameters_collide() {
        let err = first_error("function test(a: int, a: bool) {}");
        assert!(matches!(err, Error::SymbolAlreadyDefined { ref name, .. } if name == "a"));
    }

    #[test]
    fn test_tuple_fields_do_not_collide_with_outer_names() {
        assert!(gather("function test() { const a = 3; var b: (a: int, b: int) }").is_ok());
    }

    #[test]
    fn test_duplicate_tuple_field() {
        let err = first_error("type P is (x: int, x: int)");
        assert!(matches!(err, Error::SymbolAlreadyDefined { ref name, .. } if name == "x"));
    }

    #[test]
    fn test_errors_from_independent_subtrees_are_all_reported() {
        let errors = gather("const a = 1\n const a = 2\n function f(b: int) { const b = 1 }").unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_default_to_const() {
        let mut ast = Ast::new();
        let script = parse_script("function test(a: int, var b: int, const c: int) {}", "test", &mut ast).unwrap();
        let modules = ModuleMap::new();
        let mut state = AnalysisState::new(&mut ast, &modules);
        scope_creation::run(&mut state, script).unwrap();
        run(&mut state, script).unwrap();

        let func = state.ast.child(script, 0).unwrap();
        let params = state.ast.child(func, 0).unwrap();
        let flags: Vec<AstFlags> = state
            .ast
            .child_ids(params)
            .into_iter()
            .map(|p| state.ast.flags(p) & (AstFlags::CONST | AstFlags::VAR))
            .collect();
        assert_eq!(flags, vec![AstFlags::CONST, AstFlags::VAR, AstFlags::CONST]);
    }

    #[test]
    fn test_parameters_are_visible_in_function_scope() {
        let mut ast = Ast::new();
        let script = parse_script("function f(x: int) { x }", "test", &mut ast).unwrap();
        let modules = ModuleMap::new();
        let mut state = AnalysisState::new(&mut ast, &modules);
        scope_creation::run(&mut state, script).unwrap();
        run(&mut state, script).unwrap();

        let func = state.ast.child(script, 0).unwrap();
        let params = state.ast.child(func, 0).unwrap();
        let param = state.ast.child(params, 0).unwrap();
        let func_scope = state.scope_of(func);
        assert_eq!(state.scopes.find(func_scope, "x", false), Some(param));
        assert_eq!(state.scopes.find(state.scope_of(script), "f", false), Some(func));
    }

    #[test]
    fn test_actor_members_and_messages() {
        assert!(gather(
            "actor A(limit: int) {
                var count = 0
                output done(total: int)
                input add(n: int) { count += n }
                input reset(n: int) { count = n }
            }"
        )
        .is_ok());

        let err = first_error("actor A() { output out(a: int)\n input out() {} }");
        assert!(matches!(err, Error::SymbolAlreadyDefined { ref name, .. } if name == "out"));
    }

    #[test]
    fn test_unknown_module() {
        let err = first_error("import nowhere");
        assert!(matches!(err, Error::UnknownModule { ref name, .. } if name == "nowhere"));
        assert!(gather("import extern \"stdio.h\"").is_ok());
    }
}

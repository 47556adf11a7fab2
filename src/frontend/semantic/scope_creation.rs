//! Scope creation pass
//!
//! Assigns a scope to every node. Scope-owning kinds open a child of the
//! enclosing scope; all other nodes share the scope of their parent.

use crate::frontend::ast::NodeId;
use crate::frontend::semantic::scope::ScopeId;
use crate::frontend::semantic::state::AnalysisState;
use crate::frontend::semantic::walk::SemanticResult;

pub fn run(state: &mut AnalysisState<'_>, root: NodeId) -> SemanticResult {
    let scope = state.root_scope();
    create_scopes(state, root, scope);
    log::debug!("created {} scopes", state.scopes.len());
    Ok(root)
}

fn create_scopes(state: &mut AnalysisState<'_>, node: NodeId, current: ScopeId) {
    let scope = if state.ast.kind(node).needs_own_scope() {
        state.scopes.create(current)
    } else {
        current
    };
    state.set_scope(node, scope);

    for (_, child) in state.ast.walkable_children(node) {
        create_scopes(state, child, scope);
    }
}

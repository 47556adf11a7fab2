//! Semantic Analysis for FIL-S
//!
//! Performs, in order:
//! - Scope creation
//! - Symbol gathering (declarations, parameters, imports)
//! - Pre-type-check (self references, typedef collapsing)
//! - Type checking
//! - Return type checking
//!
//! A pass that reports any error stops the pipeline.

mod assign;
mod gather;
mod pre_type_check;
mod scope;
mod scope_creation;
mod state;
mod type_check;
mod walk;

pub use assign::{assign_check, Coercion};
pub use scope::{ScopeId, ScopeTable};
pub use state::{AnalysisState, ModuleMap, RUNTIME_MODULE};
pub use walk::SemanticResult;

use crate::frontend::ast::{Ast, NodeId};
use crate::frontend::parser::parse_script;

type Pass = fn(&mut AnalysisState<'_>, NodeId) -> SemanticResult;

const PASSES: [(&str, Pass); 5] = [
    ("scope creation", scope_creation::run),
    ("symbol gather", gather::run),
    ("pre type check", pre_type_check::run),
    ("type check", type_check::run_first),
    ("return check", type_check::run_second),
];

/// Analyze the tree rooted at `root` (a script or a module). `modules`
/// holds already analyzed modules which imports resolve against.
pub fn semantic_analysis(ast: &mut Ast, root: NodeId, modules: &ModuleMap) -> SemanticResult {
    let mut state = AnalysisState::new(ast, modules);
    let mut current = root;

    for (name, pass) in PASSES {
        log::debug!("running pass: {}", name);
        current = pass(&mut state, current).map_err(|errors| {
            log::debug!("pass '{}' failed with {} error(s)", name, errors.len());
            errors
        })?;
    }
    Ok(current)
}

/// Parse `source` as a script named `name` and analyze it
pub fn analyze_source(ast: &mut Ast, source: &str, name: &str, modules: &ModuleMap) -> SemanticResult {
    let script = parse_script(source, name, ast).map_err(|e| vec![e])?;
    semantic_analysis(ast, script, modules)
}

//! FIL-S compiler front end
//!
//! Lexing, parsing, module assembly and the multi-pass semantic analysis
//! of FIL-S, an actor-oriented language for embedded targets.

pub mod feedback;
pub mod frontend;
pub mod types;
pub mod utils;

pub use frontend::ast::{Ast, NodeId};
pub use frontend::semantic::{analyze_source, semantic_analysis, ModuleMap, SemanticResult};
pub use utils::{Error, Result};

//! Source location tracking

use std::fmt;

use serde::{Deserialize, Serialize};

/// A line/column position in a script. Both start at 1; `0:0` marks
/// synthesized nodes that have no source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    /// Index of the source the position belongs to (see `Ast::source_name`)
    #[serde(default)]
    pub source: u32,
}

impl Position {
    /// Create a new position in the first source
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column, source: 0 }
    }

    /// Create a new position in source `source`
    pub fn in_source(source: u32, line: u32, column: u32) -> Self {
        Self { line, column, source }
    }

    /// Position of synthesized nodes
    pub fn synthetic() -> Self {
        Self::new(0, 0)
    }

    pub fn is_synthetic(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(line: {}, col: {})", self.line, self.column)
    }
}

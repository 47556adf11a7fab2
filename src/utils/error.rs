//! Error handling for the FIL-S compiler

use crate::utils::Position;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Lexer Errors ====================
    #[error("Unterminated string literal")]
    UnterminatedString { pos: Position },

    #[error("Unterminated block comment")]
    UnterminatedComment { pos: Position },

    #[error("Unexpected character: '{ch}'")]
    UnexpectedChar { ch: char, pos: Position },

    #[error("Invalid number literal '{text}'")]
    InvalidNumber { text: String, pos: Position },

    // ==================== Parser Errors ====================
    #[error("Unexpected token: expected {expected}, got {got}")]
    UnexpectedToken {
        expected: String,
        got: String,
        pos: Position,
    },

    #[error("Expected identifier")]
    ExpectedIdent { pos: Position },

    #[error("Expected type")]
    ExpectedType { pos: Position },

    #[error("Expected expression")]
    ExpectedExpr { pos: Position },

    // ==================== Symbol Errors ====================
    #[error("Symbol '{name}' already defined")]
    SymbolAlreadyDefined { name: String, pos: Position },

    #[error("Symbol '{name}' does not exist")]
    NonExistentSymbol { name: String, pos: Position },

    #[error("'{name}' is not a type")]
    NotAType { name: String, pos: Position },

    // ==================== Type Errors ====================
    #[error("Wrong type: expected '{expected}', found '{found}'")]
    WrongType {
        expected: String,
        found: String,
        pos: Position,
    },

    #[error("Incompatible types: cannot assign '{from}' to '{to}'")]
    IncompatibleTypes {
        from: String,
        to: String,
        pos: Position,
    },

    #[error("'if' condition must be 'bool', found '{found}'")]
    WrongIfConditionType { found: String, pos: Position },

    #[error("Incompatible return type: cannot return '{found}' from a function returning '{expected}'")]
    IncompatibleReturnType {
        found: String,
        expected: String,
        pos: Position,
    },

    #[error("Values of type '{found}' cannot be compared; expected 'int' or 'bool'")]
    NotComparable { found: String, pos: Position },

    #[error("Expression of type '{found}' is not callable")]
    NotCallable { found: String, pos: Position },

    #[error("Member '{member}' not found in '{ty}'")]
    MemberNotFound {
        member: String,
        ty: String,
        pos: Position,
    },

    #[error("Expression of type '{found}' cannot be indexed")]
    NotIndexable { found: String, pos: Position },

    #[error("Array index must be a single 'int' expression")]
    InvalidArrayIndex { pos: Position },

    #[error("Tuple index must be a single integer literal")]
    InvalidTupleIndex { pos: Position },

    #[error("Index {index} out of range for a tuple of {size} members")]
    IndexOutOfRange {
        index: i64,
        size: usize,
        pos: Position,
    },

    #[error("Declaration '{name}' has neither a type nor an initializer")]
    DeclarationWithoutType { name: String, pos: Position },

    // ==================== Structural Errors ====================
    #[error("Recursive reference to symbol '{name}'")]
    RecursiveSymbolReference { name: String, pos: Position },

    #[error("'return' outside of a function")]
    ReturnOutsideFunction { pos: Position },

    #[error("Actor instances can only be created as actor members")]
    MisplacedActorInstance { pos: Position },

    #[error("Actor '{name}' cannot instantiate itself")]
    RecursiveActorInstance { name: String, pos: Position },

    #[error("Actor instances must be declared 'const'")]
    NonConstActorInstance { pos: Position },

    #[error("Unnamed input is not connected to any output")]
    UnspecifiedConnectOutput { pos: Position },

    #[error("'{path}' is not an output message")]
    InvalidConnectOutput { path: String, pos: Position },

    #[error("Not implemented: {feature}")]
    NotImplemented { feature: String, pos: Position },

    // ==================== Module Errors ====================
    #[error("Unknown module '{name}'")]
    UnknownModule { name: String, pos: Position },

    #[error("Module error: {0}")]
    ModuleError(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// Get the source position associated with this error
    pub fn position(&self) -> Option<Position> {
        match self {
            Self::UnterminatedString { pos }
            | Self::UnterminatedComment { pos }
            | Self::UnexpectedChar { pos, .. }
            | Self::InvalidNumber { pos, .. }
            | Self::UnexpectedToken { pos, .. }
            | Self::ExpectedIdent { pos }
            | Self::ExpectedType { pos }
            | Self::ExpectedExpr { pos }
            | Self::SymbolAlreadyDefined { pos, .. }
            | Self::NonExistentSymbol { pos, .. }
            | Self::NotAType { pos, .. }
            | Self::WrongType { pos, .. }
            | Self::IncompatibleTypes { pos, .. }
            | Self::WrongIfConditionType { pos, .. }
            | Self::IncompatibleReturnType { pos, .. }
            | Self::NotComparable { pos, .. }
            | Self::NotCallable { pos, .. }
            | Self::MemberNotFound { pos, .. }
            | Self::NotIndexable { pos, .. }
            | Self::InvalidArrayIndex { pos }
            | Self::InvalidTupleIndex { pos }
            | Self::IndexOutOfRange { pos, .. }
            | Self::DeclarationWithoutType { pos, .. }
            | Self::RecursiveSymbolReference { pos, .. }
            | Self::ReturnOutsideFunction { pos }
            | Self::MisplacedActorInstance { pos }
            | Self::RecursiveActorInstance { pos, .. }
            | Self::NonConstActorInstance { pos }
            | Self::UnspecifiedConnectOutput { pos }
            | Self::InvalidConnectOutput { pos, .. }
            | Self::NotImplemented { pos, .. }
            | Self::UnknownModule { pos, .. } => Some(*pos),
            Self::ModuleError(_) | Self::Io(_) => None,
        }
    }

    /// Stable diagnostic code
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnterminatedString { .. } => "E0001",
            Self::UnterminatedComment { .. } => "E0002",
            Self::UnexpectedChar { .. } => "E0003",
            Self::InvalidNumber { .. } => "E0008",
            Self::UnexpectedToken { .. } => "E0004",
            Self::ExpectedIdent { .. } => "E0005",
            Self::ExpectedType { .. } => "E0006",
            Self::ExpectedExpr { .. } => "E0007",
            Self::SymbolAlreadyDefined { .. } => "E0100",
            Self::NonExistentSymbol { .. } => "E0101",
            Self::NotAType { .. } => "E0102",
            Self::WrongType { .. } => "E0200",
            Self::IncompatibleTypes { .. } => "E0201",
            Self::WrongIfConditionType { .. } => "E0202",
            Self::IncompatibleReturnType { .. } => "E0203",
            Self::NotCallable { .. } => "E0204",
            Self::MemberNotFound { .. } => "E0205",
            Self::NotIndexable { .. } => "E0206",
            Self::InvalidArrayIndex { .. } => "E0207",
            Self::InvalidTupleIndex { .. } => "E0208",
            Self::IndexOutOfRange { .. } => "E0209",
            Self::DeclarationWithoutType { .. } => "E0210",
            Self::NotComparable { .. } => "E0211",
            Self::RecursiveSymbolReference { .. } => "E0300",
            Self::ReturnOutsideFunction { .. } => "E0301",
            Self::MisplacedActorInstance { .. } => "E0302",
            Self::RecursiveActorInstance { .. } => "E0303",
            Self::NonConstActorInstance { .. } => "E0304",
            Self::UnspecifiedConnectOutput { .. } => "E0305",
            Self::InvalidConnectOutput { .. } => "E0306",
            Self::NotImplemented { .. } => "E0400",
            Self::UnknownModule { .. } => "E0500",
            Self::ModuleError(_) => "E0501",
            Self::Io(_) => "E0502",
        }
    }

    /// Render as `(line: L, col: C): message`, or just the message when
    /// the error has no position.
    pub fn with_position(&self) -> String {
        match self.position() {
            Some(pos) => format!("{}: {}", pos, self),
            None => self.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

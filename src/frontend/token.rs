//! Token definitions for FIL-S

use crate::utils::Position;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Position) -> Self {
        Self { kind, pos }
    }

    pub fn eof(pos: Position) -> Self {
        Self { kind: TokenKind::Eof, pos }
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ============ Keywords ============
    /// const
    Const,
    /// var
    Var,
    /// function
    Function,
    /// actor
    Actor,
    /// input
    Input,
    /// output
    Output,
    /// type
    Type,
    /// import
    Import,
    /// if
    If,
    /// else
    Else,
    /// for
    For,
    /// return
    Return,
    /// true
    True,
    /// false
    False,
    /// select
    Select,

    // ============ Literals ============
    Ident(String),
    IntLit(i64),
    FloatLit(f64),
    StringLit(String),

    // ============ Operators ============
    Plus,
    Minus,
    Star,
    /// **
    StarStar,
    Slash,
    Percent,
    /// ++
    PlusPlus,
    /// --
    MinusMinus,
    Eq,
    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// &&
    AndAnd,
    /// ||
    OrOr,
    Not,
    /// &
    And,
    /// |
    Or,
    /// ^
    Caret,
    /// ~
    Tilde,
    /// <<
    Shl,
    /// >>
    Shr,
    /// >>>
    UShr,

    // Compound assignment
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    ShlEq,
    ShrEq,
    UShrEq,
    AndEq,
    OrEq,
    CaretEq,
    StarStarEq,

    // ============ Punctuation ============
    Dot,
    Comma,
    Colon,
    Semicolon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,
}

impl TokenKind {
    /// Convert a keyword string to its token kind
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        match s {
            "const" => Some(TokenKind::Const),
            "var" => Some(TokenKind::Var),
            "function" => Some(TokenKind::Function),
            "actor" => Some(TokenKind::Actor),
            "input" => Some(TokenKind::Input),
            "output" => Some(TokenKind::Output),
            "type" => Some(TokenKind::Type),
            "import" => Some(TokenKind::Import),
            "if" => Some(TokenKind::If),
            "else" => Some(TokenKind::Else),
            "for" => Some(TokenKind::For),
            "return" => Some(TokenKind::Return),
            "true" => Some(TokenKind::True),
            "false" => Some(TokenKind::False),
            "select" => Some(TokenKind::Select),
            _ => None,
        }
    }

    /// Binding power of a binary (or assignment) operator
    pub fn binary_precedence(&self) -> Option<u8> {
        match self {
            // Assignment (lowest)
            TokenKind::Eq
            | TokenKind::PlusEq
            | TokenKind::MinusEq
            | TokenKind::StarEq
            | TokenKind::SlashEq
            | TokenKind::PercentEq
            | TokenKind::ShlEq
            | TokenKind::ShrEq
            | TokenKind::UShrEq
            | TokenKind::AndEq
            | TokenKind::OrEq
            | TokenKind::CaretEq
            | TokenKind::StarStarEq => Some(1),

            TokenKind::OrOr => Some(2),
            TokenKind::AndAnd => Some(3),
            TokenKind::Or => Some(4),
            TokenKind::Caret => Some(5),
            TokenKind::And => Some(6),
            TokenKind::EqEq | TokenKind::Ne => Some(7),
            TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge => Some(8),
            TokenKind::Shl | TokenKind::Shr | TokenKind::UShr => Some(9),
            TokenKind::Plus | TokenKind::Minus => Some(10),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Some(11),

            // Power (highest for binary)
            TokenKind::StarStar => Some(12),

            _ => None,
        }
    }

    /// True for `=` and the compound assignment operators
    pub fn is_assignment(&self) -> bool {
        self.binary_precedence() == Some(1)
    }

    /// Source text of an operator token
    pub fn operator_text(&self) -> Option<&'static str> {
        let text = match self {
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::StarStar => "**",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::Ne => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Not => "!",
            TokenKind::And => "&",
            TokenKind::Or => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::UShr => ">>>",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::PercentEq => "%=",
            TokenKind::ShlEq => "<<=",
            TokenKind::ShrEq => ">>=",
            TokenKind::UShrEq => ">>>=",
            TokenKind::AndEq => "&=",
            TokenKind::OrEq => "|=",
            TokenKind::CaretEq => "^=",
            TokenKind::StarStarEq => "**=",
            _ => return None,
        };
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert!(matches!(TokenKind::keyword_from_str("actor"), Some(TokenKind::Actor)));
        assert!(matches!(TokenKind::keyword_from_str("select"), Some(TokenKind::Select)));
        assert!(TokenKind::keyword_from_str("is").is_none());
        assert!(TokenKind::keyword_from_str("extern").is_none());
    }

    #[test]
    fn test_precedence_order() {
        assert!(TokenKind::Eq.is_assignment());
        assert!(TokenKind::UShrEq.is_assignment());
        assert!(!TokenKind::EqEq.is_assignment());
        assert!(TokenKind::Star.binary_precedence() > TokenKind::Plus.binary_precedence());
        assert!(TokenKind::AndAnd.binary_precedence() > TokenKind::OrOr.binary_precedence());
    }
}

//! Parser for FIL-S
//!
//! Recursive descent parser with Pratt parsing for expressions. Nodes are
//! allocated directly in the caller's [`Ast`] arena.

use crate::frontend::ast::{Ast, AstFlags, AstNode, AstNodeKind, NodeId};
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Position, Result};

/// Binding power of prefix operators, above every binary operator
const PREFIX_BP: u8 = 13;

/// The parser
pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    ast: &'a mut Ast,
}

/// Parse one source file into a `Script` node. `name` is recorded as
/// the source of every position in the script.
pub fn parse_script(source: &str, name: &str, ast: &mut Ast) -> Result<NodeId> {
    let source_id = ast.add_source(name);
    let mut parser = Parser::new(Lexer::with_source_id(source, source_id), ast)?;
    parser.parse_script(name)
}

impl<'a> Parser<'a> {
    /// Create a new parser from a lexer
    pub fn new(mut lexer: Lexer, ast: &'a mut Ast) -> Result<Self> {
        Ok(Self {
            tokens: lexer.tokenize()?,
            pos: 0,
            ast,
        })
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        // The token stream always ends with `Eof`
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn current_pos(&self) -> Position {
        self.current().pos
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{:?}", expected)))
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::UnexpectedToken {
            expected: expected.to_string(),
            got: format!("{:?}", self.current_kind()),
            pos: self.current_pos(),
        }
    }

    fn check_contextual(&self, word: &str) -> bool {
        matches!(self.current_kind(), TokenKind::Ident(s) if s == word)
    }

    fn parse_ident(&mut self) -> Result<(String, Position)> {
        match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                let pos = self.advance().pos;
                Ok((name, pos))
            }
            _ => Err(Error::ExpectedIdent { pos: self.current_pos() }),
        }
    }

    fn add(&mut self, node: AstNode) -> NodeId {
        self.ast.add(node)
    }

    // ==================== Items ====================

    /// Parse a complete script
    pub fn parse_script(&mut self, name: &str) -> Result<NodeId> {
        let pos = self.current_pos();
        let mut items = Vec::new();

        while !self.is_at_end() {
            if self.consume(&TokenKind::Semicolon) {
                continue;
            }
            items.push(Some(self.parse_item()?));
        }

        Ok(self.add(AstNode::new(AstNodeKind::Script, pos).with_name(name).with_children(items)))
    }

    /// Parse a top-level item
    fn parse_item(&mut self) -> Result<NodeId> {
        match self.current_kind() {
            TokenKind::Const | TokenKind::Var => self.parse_var_or_const(AstFlags::empty()),
            TokenKind::Type => self.parse_typedef(),
            TokenKind::Function => self.parse_function(),
            TokenKind::Actor => self.parse_actor(),
            TokenKind::Import => self.parse_import(),
            _ => Err(self.unexpected("item (const, var, type, function, actor, import)")),
        }
    }

    /// `const|var name [: type] [= expr]`
    fn parse_var_or_const(&mut self, extra: AstFlags) -> Result<NodeId> {
        let flags = match self.advance().kind {
            TokenKind::Var => AstFlags::VAR,
            _ => AstFlags::CONST,
        };
        self.parse_declaration(flags | extra)
    }

    fn parse_declaration(&mut self, flags: AstFlags) -> Result<NodeId> {
        let (name, pos) = self.parse_ident()?;

        let type_desc = if self.consume(&TokenKind::Colon) {
            Some(self.parse_type_desc()?)
        } else {
            None
        };
        let init = if self.consume(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(self.add(
            AstNode::new(AstNodeKind::Declaration, pos)
                .with_name(name)
                .with_flags(flags)
                .with_children(vec![type_desc, init]),
        ))
    }

    /// `type Name is <type>`
    fn parse_typedef(&mut self) -> Result<NodeId> {
        let pos = self.expect(TokenKind::Type)?.pos;
        let (name, _) = self.parse_ident()?;
        if !self.check_contextual("is") {
            return Err(self.unexpected("is"));
        }
        self.advance();
        let desc = self.parse_type_desc()?;

        Ok(self.add(AstNode::new(AstNodeKind::Typedef, pos).with_name(name).with_children(vec![Some(desc)])))
    }

    /// `function [name] (params) [: type] (expr | ;)`
    fn parse_function(&mut self) -> Result<NodeId> {
        let pos = self.expect(TokenKind::Function)?.pos;
        let name = if matches!(self.current_kind(), TokenKind::Ident(_)) {
            self.parse_ident()?.0
        } else {
            String::new()
        };

        let params = self.parse_tuple_def(true)?;
        let ret = if self.consume(&TokenKind::Colon) {
            Some(self.parse_type_desc()?)
        } else {
            None
        };
        let body = if self.consume(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };

        Ok(self.add(
            AstNode::new(AstNodeKind::Function, pos)
                .with_name(name)
                .with_children(vec![Some(params), ret, body]),
        ))
    }

    /// `actor Name (params) { members }`
    fn parse_actor(&mut self) -> Result<NodeId> {
        let pos = self.expect(TokenKind::Actor)?.pos;
        let (name, _) = self.parse_ident()?;
        let params = self.parse_tuple_def(true)?;

        let mut children = vec![Some(params)];
        self.expect(TokenKind::LBrace)?;
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.consume(&TokenKind::Semicolon) {
                continue;
            }
            children.push(Some(self.parse_actor_member()?));
        }
        self.expect(TokenKind::RBrace)?;

        Ok(self.add(AstNode::new(AstNodeKind::Actor, pos).with_name(name).with_children(children)))
    }

    fn parse_actor_member(&mut self) -> Result<NodeId> {
        match self.current_kind() {
            TokenKind::Const | TokenKind::Var => self.parse_var_or_const(AstFlags::ACTOR_MEMBER),
            TokenKind::Input => self.parse_input(),
            TokenKind::Output => self.parse_output(),
            _ => Err(self.unexpected("actor member (const, var, input, output)")),
        }
    }

    /// `input name (params) block`, or an unnamed input connected to an
    /// output path: `input a.b (params) block`
    fn parse_input(&mut self) -> Result<NodeId> {
        let pos = self.expect(TokenKind::Input)?.pos;

        let mut path = Vec::new();
        if matches!(self.current_kind(), TokenKind::Ident(_)) {
            path.push(self.parse_ident()?.0);
            while self.consume(&TokenKind::Dot) {
                path.push(self.parse_ident()?.0);
            }
        }

        let params = self.parse_tuple_def(true)?;
        let body = self.parse_block()?;
        let children = vec![Some(params), Some(body)];

        let node = if path.len() == 1 {
            AstNode::new(AstNodeKind::Input, pos).with_name(path.remove(0))
        } else {
            AstNode::new(AstNodeKind::UnnamedInput, pos).with_value(path.join("."))
        };
        Ok(self.add(node.with_children(children)))
    }

    /// `output name (params)`
    fn parse_output(&mut self) -> Result<NodeId> {
        let pos = self.expect(TokenKind::Output)?.pos;
        let (name, _) = self.parse_ident()?;
        let params = self.parse_tuple_def(false)?;

        Ok(self.add(AstNode::new(AstNodeKind::Output, pos).with_name(name).with_children(vec![Some(params)])))
    }

    /// `import name` or `import extern "header.h"`
    fn parse_import(&mut self) -> Result<NodeId> {
        let pos = self.expect(TokenKind::Import)?.pos;
        let mut flags = AstFlags::empty();
        if self.check_contextual("extern") {
            self.advance();
            flags |= AstFlags::EXTERN_C;
        }

        let target = match self.current_kind().clone() {
            TokenKind::Ident(name) | TokenKind::StringLit(name) => {
                self.advance();
                name
            }
            _ => return Err(self.unexpected("module name")),
        };

        Ok(self.add(AstNode::new(AstNodeKind::Import, pos).with_value(target).with_flags(flags)))
    }

    // ==================== Types ====================

    fn parse_type_desc(&mut self) -> Result<NodeId> {
        let pos = self.current_pos();
        let mut desc = match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                self.add(AstNode::new(AstNodeKind::TypeName, pos).with_name(name))
            }
            TokenKind::LParen => self.parse_tuple_def(false)?,
            TokenKind::Function => {
                self.advance();
                let params = self.parse_tuple_def(false)?;
                let ret = if self.consume(&TokenKind::Colon) {
                    Some(self.parse_type_desc()?)
                } else {
                    None
                };
                self.add(AstNode::new(AstNodeKind::FunctionType, pos).with_children(vec![Some(params), ret]))
            }
            TokenKind::Input | TokenKind::Output => {
                let direction = if self.advance().kind == TokenKind::Input {
                    "input"
                } else {
                    "output"
                };
                let params = self.parse_tuple_def(false)?;
                self.add(
                    AstNode::new(AstNodeKind::MessageType, pos)
                        .with_value(direction)
                        .with_children(vec![Some(params)]),
                )
            }
            _ => return Err(Error::ExpectedType { pos }),
        };

        while self.check(&TokenKind::LBracket) {
            let bracket = self.advance().pos;
            let size = self.parse_expr()?;
            self.expect(TokenKind::RBracket)?;
            desc = self.add(AstNode::new(AstNodeKind::ArrayDecl, bracket).with_children(vec![Some(desc), Some(size)]));
        }

        Ok(desc)
    }

    /// `( item, ... )` where each item is a declaration or a bare type.
    /// Parameter lists mark their declarations as function parameters.
    fn parse_tuple_def(&mut self, parameters: bool) -> Result<NodeId> {
        let pos = self.expect(TokenKind::LParen)?.pos;
        let mut members = Vec::new();

        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            members.push(Some(self.parse_tuple_item(parameters)?));
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok(self.add(AstNode::new(AstNodeKind::TupleDef, pos).with_children(members)))
    }

    fn parse_tuple_item(&mut self, parameters: bool) -> Result<NodeId> {
        let param_flag = if parameters {
            AstFlags::FUNCTION_PARAMETER
        } else {
            AstFlags::empty()
        };

        match self.current_kind() {
            TokenKind::Const | TokenKind::Var => self.parse_var_or_const(param_flag),
            TokenKind::Ident(_) if matches!(self.peek_kind(), TokenKind::Colon) => {
                self.parse_declaration(param_flag)
            }
            _ => self.parse_type_desc(),
        }
    }

    // ==================== Blocks ====================

    fn parse_block(&mut self) -> Result<NodeId> {
        let pos = self.expect(TokenKind::LBrace)?.pos;
        let mut statements = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.consume(&TokenKind::Semicolon) {
                continue;
            }
            let statement = match self.current_kind() {
                TokenKind::Const | TokenKind::Var => self.parse_var_or_const(AstFlags::empty())?,
                TokenKind::Type => self.parse_typedef()?,
                _ => self.parse_expr()?,
            };
            statements.push(Some(statement));
        }
        self.expect(TokenKind::RBrace)?;

        Ok(self.add(AstNode::new(AstNodeKind::Block, pos).with_children(statements)))
    }

    // ==================== Expression Parsing (Pratt) ====================

    fn parse_expr(&mut self) -> Result<NodeId> {
        self.parse_expr_bp(0)
    }

    /// Parse expression with binding power (Pratt parsing)
    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<NodeId> {
        let mut left = self.parse_prefix()?;

        loop {
            let op_token = self.current().clone();
            let Some(bp) = op_token.kind.binary_precedence() else {
                break;
            };
            if bp < min_bp {
                break;
            }
            self.advance();

            let op = op_token.kind.operator_text().unwrap_or_default();
            let is_assignment = op_token.kind.is_assignment();

            // Right-associative for assignment
            let next_bp = if is_assignment { bp } else { bp + 1 };
            let right = self.parse_expr_bp(next_bp)?;

            let kind = if is_assignment {
                AstNodeKind::Assignment
            } else {
                AstNodeKind::BinaryOp
            };
            left = self.add(
                AstNode::new(kind, op_token.pos)
                    .with_value(op)
                    .with_children(vec![Some(left), Some(right)]),
            );
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<NodeId> {
        let token = self.current().clone();
        let is_prefix = matches!(
            token.kind,
            TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::Not
                | TokenKind::Tilde
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
        );
        if !is_prefix {
            let primary = self.parse_primary()?;
            return self.parse_postfix(primary);
        }

        self.advance();
        let operand = self.parse_expr_bp(PREFIX_BP)?;
        Ok(self.add(
            AstNode::new(AstNodeKind::PrefixOp, token.pos)
                .with_value(token.kind.operator_text().unwrap_or_default())
                .with_children(vec![Some(operand)]),
        ))
    }

    fn parse_primary(&mut self) -> Result<NodeId> {
        let token = self.current().clone();

        let node = match &token.kind {
            TokenKind::IntLit(n) => {
                self.advance();
                AstNode::new(AstNodeKind::Integer, token.pos).with_value(n.to_string())
            }
            TokenKind::FloatLit(n) => {
                self.advance();
                AstNode::new(AstNodeKind::Float, token.pos).with_value(n.to_string())
            }
            TokenKind::StringLit(s) => {
                self.advance();
                AstNode::new(AstNodeKind::Str, token.pos).with_value(s.clone())
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                let value = if token.kind == TokenKind::True { "true" } else { "false" };
                AstNode::new(AstNodeKind::Bool, token.pos).with_value(value)
            }
            TokenKind::Ident(name) => {
                self.advance();
                AstNode::new(AstNodeKind::Identifier, token.pos).with_name(name.clone())
            }
            TokenKind::LParen => return self.parse_paren(),
            TokenKind::LBrace => return self.parse_block(),
            TokenKind::If => return self.parse_if(),
            TokenKind::For => return self.parse_for(),
            TokenKind::Return => return self.parse_return(),
            TokenKind::Function => return self.parse_function(),
            TokenKind::Select => return self.parse_select(),
            _ => return Err(Error::ExpectedExpr { pos: token.pos }),
        };

        Ok(self.add(node))
    }

    fn parse_postfix(&mut self, mut expr: NodeId) -> Result<NodeId> {
        loop {
            let token = self.current().clone();
            match token.kind {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_expr_list(token.pos, TokenKind::RParen)?;
                    expr = self.add(
                        AstNode::new(AstNodeKind::Call, token.pos).with_children(vec![Some(expr), Some(args)]),
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    let args = self.parse_expr_list(token.pos, TokenKind::RBracket)?;
                    expr = self.add(
                        AstNode::new(AstNodeKind::CtCall, token.pos).with_children(vec![Some(expr), Some(args)]),
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    let (member, member_pos) = self.parse_ident()?;
                    let member = self.add(AstNode::new(AstNodeKind::MemberName, member_pos).with_name(member));
                    expr = self.add(
                        AstNode::new(AstNodeKind::MemberAccess, token.pos)
                            .with_children(vec![Some(expr), Some(member)]),
                    );
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    self.advance();
                    expr = self.add(
                        AstNode::new(AstNodeKind::PostfixOp, token.pos)
                            .with_value(token.kind.operator_text().unwrap_or_default())
                            .with_children(vec![Some(expr)]),
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Comma separated expressions up to `close`, as a tuple node
    fn parse_expr_list(&mut self, pos: Position, close: TokenKind) -> Result<NodeId> {
        let mut items = Vec::new();
        while !self.check(&close) && !self.is_at_end() {
            items.push(Some(self.parse_expr()?));
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(self.add(AstNode::new(AstNodeKind::Tuple, pos).with_children(items)))
    }

    /// `(expr)` is a parenthesised expression; `()` and `(a, b, ...)` are tuples
    fn parse_paren(&mut self) -> Result<NodeId> {
        let pos = self.expect(TokenKind::LParen)?.pos;
        if self.consume(&TokenKind::RParen) {
            return Ok(self.add(AstNode::new(AstNodeKind::Tuple, pos)));
        }

        let first = self.parse_expr()?;
        if self.consume(&TokenKind::RParen) {
            return Ok(first);
        }

        let mut items = vec![Some(first)];
        while self.consume(&TokenKind::Comma) {
            if self.check(&TokenKind::RParen) {
                break;
            }
            items.push(Some(self.parse_expr()?));
        }
        self.expect(TokenKind::RParen)?;

        Ok(self.add(AstNode::new(AstNodeKind::Tuple, pos).with_children(items)))
    }

    /// `if (cond) expr [;] [else expr]`
    fn parse_if(&mut self) -> Result<NodeId> {
        let pos = self.expect(TokenKind::If)?.pos;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let then_branch = self.parse_expr()?;

        if self.check(&TokenKind::Semicolon) && matches!(self.peek_kind(), TokenKind::Else) {
            self.advance();
        }
        let else_branch = if self.consume(&TokenKind::Else) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(self.add(
            AstNode::new(AstNodeKind::If, pos).with_children(vec![Some(cond), Some(then_branch), else_branch]),
        ))
    }

    /// `for (init; cond; step) body`, every header part optional
    fn parse_for(&mut self) -> Result<NodeId> {
        let pos = self.expect(TokenKind::For)?.pos;
        self.expect(TokenKind::LParen)?;

        let init = match self.current_kind() {
            TokenKind::Semicolon => None,
            TokenKind::Const | TokenKind::Var => Some(self.parse_var_or_const(AstFlags::empty())?),
            _ => Some(self.parse_expr()?),
        };
        self.expect(TokenKind::Semicolon)?;
        let cond = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semicolon)?;
        let step = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::RParen)?;
        let body = self.parse_expr()?;

        Ok(self.add(AstNode::new(AstNodeKind::For, pos).with_children(vec![init, cond, step, Some(body)])))
    }

    fn parse_return(&mut self) -> Result<NodeId> {
        let pos = self.expect(TokenKind::Return)?.pos;
        let has_value = !matches!(
            self.current_kind(),
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::RParen | TokenKind::Else | TokenKind::Eof
        );
        let value = if has_value { Some(self.parse_expr()?) } else { None };

        Ok(self.add(AstNode::new(AstNodeKind::Return, pos).with_children(vec![value])))
    }

    /// `select` is accepted syntactically; its body is skipped
    fn parse_select(&mut self) -> Result<NodeId> {
        let pos = self.expect(TokenKind::Select)?.pos;
        if self.check(&TokenKind::LBrace) {
            let mut depth = 0usize;
            loop {
                match self.advance().kind {
                    TokenKind::LBrace => depth += 1,
                    TokenKind::RBrace => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    TokenKind::Eof => return Err(self.unexpected("}")),
                    _ => {}
                }
            }
        }
        Ok(self.add(AstNode::new(AstNodeKind::Select, pos)))
    }
}

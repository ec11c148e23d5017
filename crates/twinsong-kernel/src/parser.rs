//! Recursive-descent parser for the embedded language.
//!
//! Grammar notes:
//! - Statements separate on newlines and semicolons.
//! - Compound statements (`if`/`elif`/`else`, `while`, `for`) take inline
//!   suites only: simple statements on the same line after the colon.
//! - Tuples require parentheses; `(x,)` is a one-tuple, `()` is empty.

use crate::ast::{BinOp, BoolOp, CmpOp, Expr, Program, Stmt, Target, UnaryOp};
use crate::exec::ExecError;
use crate::lexer::{SpannedToken, Token, tokenize};

pub fn parse(source: &str) -> Result<Program, ExecError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_program()
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos].line
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), ExecError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(ExecError::syntax(
                self.line(),
                format!("expected {}, found {:?}", what, self.peek()),
            ))
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Token::Newline | Token::Semicolon) {
            self.advance();
        }
    }

    fn parse_program(&mut self) -> Result<Program, ExecError> {
        let mut body = Vec::new();
        self.skip_separators();
        while !matches!(self.peek(), Token::Eof) {
            body.push(self.parse_stmt()?);
            if !matches!(self.peek(), Token::Eof) {
                if !matches!(self.peek(), Token::Newline | Token::Semicolon) {
                    return Err(ExecError::syntax(
                        self.line(),
                        format!("unexpected {:?} after statement", self.peek()),
                    ));
                }
                self.skip_separators();
            }
        }
        Ok(Program { body })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ExecError> {
        match self.peek() {
            Token::If => self.parse_if(),
            Token::While => self.parse_while(),
            Token::For => self.parse_for(),
            _ => self.parse_simple_stmt(),
        }
    }

    /// Inline suite: simple statements separated by `;` up to the end of
    /// the line. Compound statements are not allowed inside one.
    fn parse_suite(&mut self) -> Result<Vec<Stmt>, ExecError> {
        self.expect(&Token::Colon, "':'")?;
        if matches!(self.peek(), Token::Newline | Token::Eof) {
            return Err(ExecError::syntax(
                self.line(),
                "expected an inline statement after ':'",
            ));
        }
        let mut body = Vec::new();
        loop {
            if matches!(self.peek(), Token::If | Token::While | Token::For) {
                return Err(ExecError::syntax(
                    self.line(),
                    "compound statements are not allowed in an inline suite",
                ));
            }
            body.push(self.parse_simple_stmt()?);
            if self.eat(&Token::Semicolon) {
                if matches!(self.peek(), Token::Newline | Token::Eof) {
                    break;
                }
                continue;
            }
            break;
        }
        Ok(body)
    }

    fn parse_if(&mut self) -> Result<Stmt, ExecError> {
        self.expect(&Token::If, "'if'")?;
        let cond = self.parse_expr()?;
        let body = self.parse_suite()?;
        let mut branches = vec![(cond, body)];
        let mut orelse = Vec::new();

        loop {
            // `elif`/`else` continue on the following line.
            let mark = self.pos;
            self.skip_separators();
            match self.peek() {
                Token::Elif => {
                    self.advance();
                    let cond = self.parse_expr()?;
                    let body = self.parse_suite()?;
                    branches.push((cond, body));
                }
                Token::Else => {
                    self.advance();
                    orelse = self.parse_suite()?;
                    break;
                }
                _ => {
                    self.pos = mark;
                    break;
                }
            }
        }

        Ok(Stmt::If { branches, orelse })
    }

    fn parse_while(&mut self) -> Result<Stmt, ExecError> {
        self.expect(&Token::While, "'while'")?;
        let cond = self.parse_expr()?;
        let body = self.parse_suite()?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, ExecError> {
        self.expect(&Token::For, "'for'")?;
        let name = match self.advance() {
            Token::Name(name) => name,
            other => {
                return Err(ExecError::syntax(
                    self.line(),
                    format!("expected loop variable, found {:?}", other),
                ));
            }
        };
        self.expect(&Token::In, "'in'")?;
        let iter = self.parse_expr()?;
        let body = self.parse_suite()?;
        Ok(Stmt::For { name, iter, body })
    }

    fn parse_simple_stmt(&mut self) -> Result<Stmt, ExecError> {
        if self.eat(&Token::Pass) {
            return Ok(Stmt::Pass);
        }
        let expr = self.parse_expr()?;
        if self.eat(&Token::Assign) {
            let target = self.to_target(expr)?;
            let value = self.parse_expr()?;
            return Ok(Stmt::Assign { target, value });
        }
        Ok(Stmt::Expr(expr))
    }

    fn to_target(&self, expr: Expr) -> Result<Target, ExecError> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Attr { value, name } => Ok(Target::Attr {
                value: *value,
                name,
            }),
            Expr::Subscript { value, index } => Ok(Target::Subscript {
                value: *value,
                index: *index,
            }),
            _ => Err(ExecError::syntax(self.line(), "cannot assign to expression")),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExecError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ExecError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Bool {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExecError> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = Expr::Bool {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExecError> {
        if self.eat(&Token::Not) {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExecError> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Token::Eq => CmpOp::Eq,
            Token::NotEq => CmpOp::NotEq,
            Token::Lt => CmpOp::Lt,
            Token::LtEq => CmpOp::LtEq,
            Token::Gt => CmpOp::Gt,
            Token::GtEq => CmpOp::GtEq,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ExecError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExecError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::DoubleSlash => BinOp::FloorDiv,
                Token::Percent => BinOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExecError> {
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExecError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let name = match self.advance() {
                        Token::Name(name) => name,
                        other => {
                            return Err(ExecError::syntax(
                                self.line(),
                                format!("expected attribute name, found {:?}", other),
                            ));
                        }
                    };
                    expr = Expr::Attr {
                        value: Box::new(expr),
                        name,
                    };
                }
                Token::LParen => {
                    self.advance();
                    let args = self.parse_expr_list(&Token::RParen)?;
                    self.expect(&Token::RParen, "')'")?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                    };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&Token::RBracket, "']'")?;
                    expr = Expr::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_expr_list(&mut self, close: &Token) -> Result<Vec<Expr>, ExecError> {
        let mut items = Vec::new();
        if self.peek() == close {
            return Ok(items);
        }
        loop {
            items.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
            if self.peek() == close {
                break;
            }
        }
        Ok(items)
    }

    fn parse_atom(&mut self) -> Result<Expr, ExecError> {
        let line = self.line();
        match self.advance() {
            Token::None => Ok(Expr::None),
            Token::True => Ok(Expr::True),
            Token::False => Ok(Expr::False),
            Token::Int(value) => Ok(Expr::Int(value)),
            Token::Float(value) => Ok(Expr::Float(value)),
            Token::Str(value) => Ok(Expr::Str(value)),
            Token::Name(name) => Ok(Expr::Name(name)),
            Token::LParen => {
                if self.eat(&Token::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.parse_expr()?;
                if self.eat(&Token::Comma) {
                    let mut items = vec![first];
                    items.extend(self.parse_expr_list(&Token::RParen)?);
                    self.expect(&Token::RParen, "')'")?;
                    Ok(Expr::Tuple(items))
                } else {
                    self.expect(&Token::RParen, "')'")?;
                    Ok(first)
                }
            }
            Token::LBracket => {
                let items = self.parse_expr_list(&Token::RBracket)?;
                self.expect(&Token::RBracket, "']'")?;
                Ok(Expr::List(items))
            }
            Token::LBrace => {
                let mut entries = Vec::new();
                if !self.eat(&Token::RBrace) {
                    loop {
                        let key = self.parse_expr()?;
                        self.expect(&Token::Colon, "':'")?;
                        let value = self.parse_expr()?;
                        entries.push((key, value));
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                        if self.peek() == &Token::RBrace {
                            break;
                        }
                    }
                    self.expect(&Token::RBrace, "'}'")?;
                }
                Ok(Expr::Dict(entries))
            }
            other => Err(ExecError::syntax(
                line,
                format!("unexpected {:?}", other),
            )),
        }
    }
}

// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Hand-written recursive descent parser for normalized model equations.
//!
//! Precedence, loosest to tightest: `and`/`or`, equality, comparison,
//! additive, multiplicative, unary sign/`not`, `^` (right associative),
//! then calls and atoms.

use obr_core::eqn_err;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::builtins::{Loc, UntypedBuiltinFn};
use crate::common::{EquationError, EquationResult, ErrorCode};
use crate::lexer::{Lexer, Spanned, Token};


/// TokenKind discriminant for efficient peek comparisons without payload matching
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    Eq,
    Neq,
    Not,
    Exp,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
    LParen,
    RParen,
    Comma,
    Ident,
    Num,
    Str,
}

impl<'a> From<&Token<'a>> for TokenKind {
    fn from(token: &Token<'a>) -> Self {
        match token {
            Token::Eq => TokenKind::Eq,
            Token::Neq => TokenKind::Neq,
            Token::Not => TokenKind::Not,
            Token::Exp => TokenKind::Exp,
            Token::Lt => TokenKind::Lt,
            Token::Lte => TokenKind::Lte,
            Token::Gt => TokenKind::Gt,
            Token::Gte => TokenKind::Gte,
            Token::And => TokenKind::And,
            Token::Or => TokenKind::Or,
            Token::Plus => TokenKind::Plus,
            Token::Minus => TokenKind::Minus,
            Token::Mul => TokenKind::Mul,
            Token::Div => TokenKind::Div,
            Token::LParen => TokenKind::LParen,
            Token::RParen => TokenKind::RParen,
            Token::Comma => TokenKind::Comma,
            Token::Ident(_) => TokenKind::Ident,
            Token::Num(_) => TokenKind::Num,
            Token::Str(_) => TokenKind::Str,
        }
    }
}

/// Parser state holding tokenized input
struct Parser<'input> {
    tokens: Vec<Spanned<Token<'input>>>,
    pos: usize,
}

impl<'input> Parser<'input> {
    /// Create a new parser from a lexer, collecting all tokens up front.
    /// Returns an error if the lexer produces any errors.
    fn new(lexer: Lexer<'input>) -> EquationResult<Self> {
        let tokens = lexer.collect::<EquationResult<Vec<_>>>()?;
        Ok(Parser { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<&Spanned<Token<'input>>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|(_, tok, _)| TokenKind::from(tok))
    }

    fn peek_kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens
            .get(self.pos + offset)
            .map(|(_, tok, _)| TokenKind::from(tok))
    }

    /// Advance to the next token and return a copy of the consumed token
    fn advance(&mut self) -> Option<Spanned<Token<'input>>> {
        let tok = self.tokens.get(self.pos).copied();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Expect the current token to match the expected kind, returning an error if not
    fn expect(&mut self, expected: TokenKind) -> EquationResult<Spanned<Token<'input>>> {
        match self.peek() {
            Some(tok) if TokenKind::from(&tok.1) == expected => {
                let tok = *tok;
                self.pos += 1;
                Ok(tok)
            }
            Some((start, _, end)) => eqn_err!(UnrecognizedToken, *start, *end),
            None => Err(self.eof_error()),
        }
    }

    fn eof_error(&self) -> EquationError {
        let pos = if let Some((_, _, end)) = self.tokens.last() {
            *end
        } else {
            0
        };
        EquationError {
            start: pos as u16,
            end: (pos + 1) as u16,
            code: ErrorCode::UnrecognizedEof,
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Parse an equation from the token stream.
    /// Returns Ok(None) for empty input.
    fn parse_equation(&mut self) -> EquationResult<Option<Expr>> {
        if self.is_at_end() {
            return Ok(None);
        }

        let expr = self.parse_expr()?;

        if let Some((start, _, end)) = self.peek() {
            return eqn_err!(ExtraToken, *start, *end);
        }

        Ok(Some(expr))
    }

    fn parse_expr(&mut self) -> EquationResult<Expr> {
        self.parse_logical()
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        let loc = Loc::new(left.get_loc().start as usize, right.get_loc().end as usize);
        Expr::Op2(op, Box::new(left), Box::new(right), loc)
    }

    /// Parse logical operators (&&, ||, and, or) - lowest precedence binary ops
    fn parse_logical(&mut self) -> EquationResult<Expr> {
        let mut left = self.parse_equality()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::And) => BinaryOp::And,
                Some(TokenKind::Or) => BinaryOp::Or,
                _ => break,
            };
            self.advance();
            let right = self.parse_equality()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    /// Parse equality operators (==, !=, <>)
    fn parse_equality(&mut self) -> EquationResult<Expr> {
        let mut left = self.parse_comparison()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Eq) => BinaryOp::Eq,
                Some(TokenKind::Neq) => BinaryOp::Neq,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    /// Parse comparison operators (<, <=, >, >=)
    fn parse_comparison(&mut self) -> EquationResult<Expr> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Lt) => BinaryOp::Lt,
                Some(TokenKind::Lte) => BinaryOp::Lte,
                Some(TokenKind::Gt) => BinaryOp::Gt,
                Some(TokenKind::Gte) => BinaryOp::Gte,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    /// Parse additive operators (+, -)
    fn parse_additive(&mut self) -> EquationResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    /// Parse multiplicative operators (*, /)
    fn parse_multiplicative(&mut self) -> EquationResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Mul) => BinaryOp::Mul,
                Some(TokenKind::Div) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    /// Parse unary operators (+, -, !, not).  They stack, so `- -1` and
    /// `not not a` parse, and each still binds looser than `^`.
    fn parse_unary(&mut self) -> EquationResult<Expr> {
        let op = match self.peek_kind() {
            Some(TokenKind::Plus) => UnaryOp::Positive,
            Some(TokenKind::Minus) => UnaryOp::Negative,
            Some(TokenKind::Not) => UnaryOp::Not,
            _ => return self.parse_exponentiation(),
        };
        let lpos = match self.advance() {
            Some((lpos, _, _)) => lpos,
            None => return Err(self.eof_error()),
        };
        let operand = self.parse_unary()?;
        let rpos = operand.get_loc().end as usize;
        Ok(Expr::Op1(op, Box::new(operand), Loc::new(lpos, rpos)))
    }

    /// Parse exponentiation (^).  Right associative, and the exponent may
    /// carry its own sign, so `2^-1` and `2^3^2` parse as expected.
    fn parse_exponentiation(&mut self) -> EquationResult<Expr> {
        let base = self.parse_app()?;

        if self.peek_kind() != Some(TokenKind::Exp) {
            return Ok(base);
        }
        self.advance();

        let exponent = match self.peek_kind() {
            Some(TokenKind::Plus) | Some(TokenKind::Minus) => self.parse_unary()?,
            _ => self.parse_exponentiation()?,
        };

        Ok(Self::binary(BinaryOp::Exp, base, exponent))
    }

    /// Parse function application: id(args)
    fn parse_app(&mut self) -> EquationResult<Expr> {
        if self.peek_kind() != Some(TokenKind::Ident)
            || self.peek_kind_at(1) != Some(TokenKind::LParen)
        {
            return self.parse_atom();
        }

        let (lpos, name) = match self.advance() {
            Some((lpos, Token::Ident(s), _)) => (lpos, s.to_lowercase()),
            _ => unreachable!(),
        };

        self.advance(); // consume '('
        let args = self.parse_comma_separated_exprs()?;
        let (_, _, rpos) = self.expect(TokenKind::RParen)?;

        Ok(Expr::App(
            UntypedBuiltinFn(name, args),
            Loc::new(lpos, rpos),
        ))
    }

    /// Parse an atomic expression (number, string, identifier, parenthesized expression)
    fn parse_atom(&mut self) -> EquationResult<Expr> {
        let (lpos, tok, rpos) = match self.peek() {
            Some(tok) => *tok,
            None => return Err(self.eof_error()),
        };

        match tok {
            Token::Num(s) => {
                self.advance();
                match s.parse::<f64>() {
                    Ok(n) => Ok(Expr::Const(s.to_string(), n, Loc::new(lpos, rpos))),
                    Err(_) => eqn_err!(ExpectedNumber, lpos, rpos),
                }
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s.to_string(), Loc::new(lpos, rpos)))
            }
            Token::Ident(s) => {
                self.advance();
                Ok(Expr::Var(s.to_string(), Loc::new(lpos, rpos)))
            }
            Token::LParen => {
                self.advance(); // consume '('
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            _ => eqn_err!(UnrecognizedToken, lpos, rpos),
        }
    }

    /// Parse comma-separated expressions (for function arguments)
    fn parse_comma_separated_exprs(&mut self) -> EquationResult<Vec<Expr>> {
        let mut exprs = Vec::new();

        // Handle empty list
        if self.peek_kind() == Some(TokenKind::RParen) {
            return Ok(exprs);
        }

        exprs.push(self.parse_expr()?);

        while self.peek_kind() == Some(TokenKind::Comma) {
            self.advance(); // consume ','
            exprs.push(self.parse_expr()?);
        }

        Ok(exprs)
    }
}

/// Parse a normalized equation into an AST.
///
/// Returns:
/// - `Ok(Some(expr))` for valid equations
/// - `Ok(None)` for empty or whitespace-only input
/// - `Err(error)` for lexer or parse errors
pub fn parse(input: &str) -> EquationResult<Option<Expr>> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;

    parser.parse_equation()
}

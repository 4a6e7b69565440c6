//! Expression parser.
//!
//! Recursive descent over the grammar below. Errors carry the character
//! offset of the offending token.
//!
//! ```text
//! expr       := or
//! or         := and ( '|' and )*
//! and        := comparison ( '&' comparison )*
//! comparison := additive ( ('>' | '>=' | '<' | '<=' | '==' | '!=') additive )?
//! additive   := term ( ('+' | '-') term )*
//! term       := unary ( ('*' | '/') unary )*
//! unary      := '-' unary | primary
//! primary    := NUMBER | IDENT | '(' expr ')'
//! ```

use crate::domain::error::ParseError;
use crate::domain::expr::{ArithOp, CompareOp, Expr, Expression, LogicOp};

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '.'
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, ch),
                position: self.pos,
            }),
            None => Err(ParseError {
                message: format!("expected '{}', found end of input", expected),
                position: self.pos,
            }),
        }
    }

    fn consume_exact(&mut self, s: &str) -> bool {
        if self.remaining().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn found(&self) -> String {
        self.peek()
            .map(|c| format!("'{}'", c))
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn take_word(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_word_char) {
            self.advance();
        }
        &self.input[start..self.pos]
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_whitespace();
            if !self.consume_exact("|") {
                return Ok(left);
            }
            let right = self.parse_and()?;
            left = Expr::Logic {
                op: LogicOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        loop {
            self.skip_whitespace();
            if !self.consume_exact("&") {
                return Ok(left);
            }
            let right = self.parse_comparison()?;
            left = Expr::Logic {
                op: LogicOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_compare_op(&mut self) -> Result<Option<CompareOp>, ParseError> {
        self.skip_whitespace();
        // Two-character operators first so '>=' is not read as '>'.
        for (token, op) in [
            (">=", CompareOp::Gte),
            ("<=", CompareOp::Lte),
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Ne),
            (">", CompareOp::Gt),
            ("<", CompareOp::Lt),
        ] {
            if self.consume_exact(token) {
                return Ok(Some(op));
            }
        }
        if self.peek() == Some('=') {
            return Err(ParseError {
                message: "expected '==', found '='".to_string(),
                position: self.pos,
            });
        }
        Ok(None)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        let Some(op) = self.parse_compare_op()? else {
            return Ok(left);
        };
        let right = self.parse_additive()?;
        self.skip_whitespace();
        if matches!(self.peek(), Some('<' | '>' | '=' | '!')) {
            return Err(ParseError {
                message: "comparisons cannot be chained".to_string(),
                position: self.pos,
            });
        }
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('+') => ArithOp::Add,
                Some('-') => ArithOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('*') => ArithOp::Mul,
                Some('/') => ArithOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        if self.consume_exact("-") {
            let inner = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some('(') => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect_char(')')?;
                Ok(inner)
            }
            Some(ch) if ch.is_ascii_digit() || ch == '.' => {
                let word = self.take_word();
                word.parse::<f64>()
                    .map(Expr::Number)
                    .map_err(|_| ParseError {
                        message: format!("invalid number: {}", word),
                        position: start,
                    })
            }
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                Ok(Expr::Ident(self.take_word().to_string()))
            }
            _ => Err(ParseError {
                message: format!("expected number, identifier or '(', found {}", self.found()),
                position: start,
            }),
        }
    }

    fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_or()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError {
                message: format!("unexpected input after expression: '{}'", self.remaining()),
                position: self.pos,
            });
        }
        Ok(expr)
    }
}

pub fn parse(input: &str) -> Result<Expression, ParseError> {
    let mut parser = Parser::new(input);
    let root = parser.parse()?;
    Ok(Expression::new(input, root))
}

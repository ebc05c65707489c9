//! Recursive descent parser producing the expression AST

use std::fmt;

use super::lexer::{LexError, Lexer, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    String(String),

    /// Top-level binding: `hook`, `vars`
    Ident(String),

    /// `object.property`
    Member { object: Box<Expr>, property: String },

    /// `object[index]`
    Index { object: Box<Expr>, index: Box<Expr> },

    /// `target.function(args)` or `function(args)`
    Call {
        function: String,
        target: Option<Box<Expr>>,
        args: Vec<Expr>,
    },

    Unary { op: UnaryOp, expr: Box<Expr> },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },

    List(Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not, // !
    Neg, // -
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// Deepest nesting of sub-expressions a parse will accept
pub const MAX_DEPTH: usize = 100;

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    /// Open recursion levels plus operators chained onto the current operand
    depth: usize,
}

impl Parser {
    /// Lexes and parses a complete expression
    pub fn parse_str(input: &str) -> Result<Expr, ParseError> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Self {
            tokens,
            position: 0,
            depth: 0,
        };
        let expr = parser.parse_ternary()?;
        if parser.peek() != &Token::Eof {
            return Err(parser.unexpected());
        }
        Ok(expr)
    }

    // Precedence (lowest to highest):
    // ternary, ||, &&, relations (incl. `in`), + -, * / %, unary, postfix, primary

    // Each recursion level and each chained operator is charged against `depth`.

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        self.descend()?;
        let condition = self.parse_or()?;
        if !self.eat(&Token::Question) {
            self.depth = depth;
            return Ok(condition);
        }
        let then_expr = self.parse_ternary()?;
        self.expect(&Token::Colon)?;
        let else_expr = self.parse_ternary()?;
        self.depth = depth;
        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            self.descend()?;
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_relation()?;
        while self.eat(&Token::And) {
            self.descend()?;
            let right = self.parse_relation()?;
            left = binary(BinaryOp::And, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_relation(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinaryOp::Eq,
                Token::Ne => BinaryOp::Ne,
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                Token::In => BinaryOp::In,
                _ => break,
            };
            self.advance();
            self.descend()?;
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.descend()?;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            self.descend()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Token::Not => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let depth = self.depth;
        self.descend()?;
        let expr = self.parse_unary()?;
        self.depth = depth;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            if matches!(self.peek(), Token::Dot | Token::LBracket) {
                self.descend()?;
            }
            if self.eat(&Token::Dot) {
                let name = self.expect_identifier()?;
                if self.eat(&Token::LParen) {
                    let args = self.parse_args(&Token::RParen)?;
                    expr = Expr::Call {
                        function: name,
                        target: Some(Box::new(expr)),
                        args,
                    };
                } else {
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: name,
                    };
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_ternary()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                self.depth = depth;
                return Ok(expr);
            }
        }
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError {
                message: format!("expression nested deeper than {} levels", MAX_DEPTH),
            });
        }
        Ok(())
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        let expr = match token {
            Token::Null => Expr::Null,
            Token::True => Expr::Bool(true),
            Token::False => Expr::Bool(false),
            Token::Number(n) => Expr::Number(n),
            Token::String(s) => Expr::String(s),
            Token::Identifier(name) => {
                self.advance();
                if self.eat(&Token::LParen) {
                    let args = self.parse_args(&Token::RParen)?;
                    return Ok(Expr::Call {
                        function: name,
                        target: None,
                        args,
                    });
                }
                return Ok(Expr::Ident(name));
            }
            Token::LParen => {
                self.advance();
                let expr = self.parse_ternary()?;
                self.expect(&Token::RParen)?;
                return Ok(expr);
            }
            Token::LBracket => {
                self.advance();
                let items = self.parse_args(&Token::RBracket)?;
                return Ok(Expr::List(items));
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(expr)
    }

    /// Comma-separated expressions up to and including `close`
    fn parse_args(&mut self, close: &Token) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.eat(close) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_ternary()?);
            if self.eat(close) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(ParseError {
                message: format!("expected '{}', found '{}'", token, self.peek()),
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            // Keywords are valid field names after a dot.
            Token::In => {
                self.advance();
                Ok("in".to_string())
            }
            _ => Err(self.unexpected()),
        }
    }

    fn unexpected(&self) -> ParseError {
        ParseError {
            message: format!("unexpected '{}'", self.peek()),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

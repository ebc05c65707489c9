//! Expression lexer

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Null,
    True,
    False,
    Number(f64),
    String(String),

    Identifier(String),
    In,

    // Operators
    Plus,     // +
    Minus,    // -
    Star,     // *
    Slash,    // /
    Percent,  // %
    Eq,       // ==
    Ne,       // !=
    Lt,       // <
    Le,       // <=
    Gt,       // >
    Ge,       // >=
    And,      // &&
    Or,       // ||
    Not,      // !
    Dot,      // .
    Comma,    // ,
    Colon,    // :
    Question, // ?

    // Delimiters
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]

    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Null => write!(f, "null"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Number(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "'{}'", s),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::In => write!(f, "in"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Eq => write!(f, "=="),
            Token::Ne => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::And => write!(f, "&&"),
            Token::Or => write!(f, "||"),
            Token::Not => write!(f, "!"),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Question => write!(f, "?"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// Position-tagged lexing failure
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
        }
    }

    /// Tokenizes the whole input, ending with [`Token::Eof`]
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }

        let Some((pos, c)) = self.chars.next() else {
            return Ok(Token::Eof);
        };

        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '.' => Token::Dot,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '?' => Token::Question,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '=' => self.expect_second('=', Token::Eq, pos, c)?,
            '&' => self.expect_second('&', Token::And, pos, c)?,
            '|' => self.expect_second('|', Token::Or, pos, c)?,
            '!' => self.with_optional_eq(Token::Ne, Token::Not),
            '<' => self.with_optional_eq(Token::Le, Token::Lt),
            '>' => self.with_optional_eq(Token::Ge, Token::Gt),
            '\'' | '"' => self.read_string(c, pos)?,
            c if c.is_ascii_digit() => self.read_number(c, pos)?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier(c),
            other => {
                return Err(LexError {
                    message: format!("token recognition error at: '{}'", other),
                    position: pos,
                });
            }
        };

        Ok(token)
    }

    fn expect_second(
        &mut self,
        second: char,
        token: Token,
        pos: usize,
        first: char,
    ) -> Result<Token, LexError> {
        match self.chars.peek() {
            Some((_, c)) if *c == second => {
                self.chars.next();
                Ok(token)
            }
            _ => Err(LexError {
                message: format!("token recognition error at: '{}'", first),
                position: pos,
            }),
        }
    }

    fn with_optional_eq(&mut self, with_eq: Token, without: Token) -> Token {
        if matches!(self.chars.peek(), Some((_, '='))) {
            self.chars.next();
            with_eq
        } else {
            without
        }
    }

    fn read_string(&mut self, quote: char, start: usize) -> Result<Token, LexError> {
        let mut value = String::new();
        while let Some((pos, c)) = self.chars.next() {
            match c {
                c if c == quote => return Ok(Token::String(value)),
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, escaped)) => value.push(escaped),
                    None => {
                        return Err(LexError {
                            message: "unterminated escape sequence".to_string(),
                            position: pos,
                        });
                    }
                },
                c => value.push(c),
            }
        }
        Err(LexError {
            message: "unterminated string literal".to_string(),
            position: start,
        })
    }

    fn read_number(&mut self, first: char, start: usize) -> Result<Token, LexError> {
        let mut text = String::from(first);
        let mut seen_dot = false;
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                text.push(c);
            } else {
                break;
            }
            self.chars.next();
        }
        text.parse::<f64>().map(Token::Number).map_err(|_| LexError {
            message: format!("invalid number literal '{}'", text),
            position: start,
        })
    }

    fn read_identifier(&mut self, first: char) -> Token {
        let mut ident = String::from(first);
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                ident.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        match ident.as_str() {
            "null" => Token::Null,
            "true" => Token::True,
            "false" => Token::False,
            "in" => Token::In,
            _ => Token::Identifier(ident),
        }
    }
}

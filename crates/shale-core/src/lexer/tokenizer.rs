//! SQL tokenizer implementation.
//!
//! The lexer is lenient: characters it does not recognize are silently
//! dropped rather than reported, and unterminated strings take everything
//! up to end of input.

use super::{Keyword, Span, Token, TokenKind};

/// A lexer that tokenizes SQL input.
pub struct Lexer<'a> {
    /// The input source text.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// Current line (1-based).
    line: u32,
    /// Current column (1-based).
    column: u32,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Returns the character after the current one without advancing.
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advances past the current character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Current position as a span.
    fn here(&self) -> Span {
        Span::new(self.line, self.column)
    }

    /// Skips whitespace and comments.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.advance();
            }

            // Single-line comments (-- ... EOL)
            if self.peek() == Some('-') && self.peek_next() == Some('-') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }

            // Multi-line comments (/* ... */), unterminated runs to EOF
            if self.peek() == Some('/') && self.peek_next() == Some('*') {
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        Some('*') if self.peek() == Some('/') => {
                            self.advance();
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }
                continue;
            }

            break;
        }
    }

    /// Scans an identifier or keyword.
    fn scan_identifier(&mut self, span: Span) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        if let Some(keyword) = Keyword::from_str(text) {
            Token::new(TokenKind::Keyword(keyword), span)
        } else {
            Token::new(TokenKind::Identifier(String::from(text)), span)
        }
    }

    /// Scans a numeric literal (integer, or float with a single decimal point).
    fn scan_number(&mut self, span: Span) -> Token {
        let start = self.pos;
        let mut has_dot = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !has_dot && self.peek_next().is_some_and(|n| n.is_ascii_digit()) {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.input[start..self.pos];
        if has_dot {
            let value = text.parse::<f64>().unwrap_or(0.0);
            Token::new(TokenKind::Float(value), span)
        } else {
            // Overflowing integers degrade to floats rather than erroring.
            match text.parse::<i64>() {
                Ok(value) => Token::new(TokenKind::Integer(value), span),
                Err(_) => Token::new(TokenKind::Float(text.parse::<f64>().unwrap_or(0.0)), span),
            }
        }
    }

    /// Scans a string literal delimited by `quote`.
    ///
    /// A backslash escapes the quote character only; any other backslash is
    /// kept verbatim.
    fn scan_string(&mut self, quote: char, span: Span) -> Token {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') if self.peek_next() == Some(quote) => {
                    self.advance(); // backslash
                    if let Some(c) = self.advance() {
                        value.push(c);
                    }
                }
                Some(_) => {
                    if let Some(c) = self.advance() {
                        value.push(c);
                    }
                }
                None => break,
            }
        }

        Token::new(TokenKind::String(value), span)
    }

    /// Scans the next token.
    #[must_use]
    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace_and_comments();
            let span = self.here();

            let Some(c) = self.peek() else {
                return Token::new(TokenKind::Eof, span);
            };

            return match c {
                '\'' | '"' => self.scan_string(c, span),
                c if c.is_ascii_digit() => self.scan_number(span),
                c if c.is_alphabetic() || c == '_' => self.scan_identifier(span),
                '!' if self.peek_next() == Some('=') => {
                    self.advance();
                    self.advance();
                    Token::new(TokenKind::NotEq, span)
                }
                '<' if self.peek_next() == Some('>') => {
                    self.advance();
                    self.advance();
                    Token::new(TokenKind::NotEq, span)
                }
                '<' if self.peek_next() == Some('=') => {
                    self.advance();
                    self.advance();
                    Token::new(TokenKind::LtEq, span)
                }
                '>' if self.peek_next() == Some('=') => {
                    self.advance();
                    self.advance();
                    Token::new(TokenKind::GtEq, span)
                }
                '=' => self.single(TokenKind::Eq, span),
                '<' => self.single(TokenKind::Lt, span),
                '>' => self.single(TokenKind::Gt, span),
                '+' => self.single(TokenKind::Plus, span),
                '-' => self.single(TokenKind::Minus, span),
                '*' => self.single(TokenKind::Star, span),
                '/' => self.single(TokenKind::Slash, span),
                '(' => self.single(TokenKind::LeftParen, span),
                ')' => self.single(TokenKind::RightParen, span),
                ',' => self.single(TokenKind::Comma, span),
                ';' => self.single(TokenKind::Semicolon, span),
                '.' => self.single(TokenKind::Dot, span),
                _ => {
                    // Unknown character: drop it and keep scanning.
                    self.advance();
                    continue;
                }
            };
        }
    }

    fn single(&mut self, kind: TokenKind, span: Span) -> Token {
        self.advance();
        Token::new(kind, span)
    }

    /// Tokenizes the entire input, ending with an EOF token.
    #[must_use]
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}

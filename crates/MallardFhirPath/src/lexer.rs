//! FHIRPath lexer - converts expression strings into a token stream.

use crate::error::{FhirPathError, Result};
use crate::token::{Token, TokenType};

/// The FHIRPath lexer.
pub struct Lexer {
    chars: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            position: 0,
        }
    }

    /// Tokenize the whole input, ending with an Eof token.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.token_type == TokenType::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        let start = self.position;
        let c = match self.current() {
            Some(c) => c,
            None => return Ok(Token::eof(start)),
        };

        if c.is_ascii_alphabetic() || c == '_' {
            let word = self.read_identifier();
            let token_type = match word.as_str() {
                "true" => TokenType::True,
                "false" => TokenType::False,
                "div" => TokenType::Div,
                "mod" => TokenType::Mod,
                "and" => TokenType::And,
                "or" => TokenType::Or,
                "xor" => TokenType::Xor,
                _ => TokenType::Identifier,
            };
            return Ok(Token::new(token_type, word, start));
        }

        if c.is_ascii_digit() {
            return Ok(Token::new(TokenType::NumberLiteral, self.read_number(), start));
        }

        match c {
            '\'' => {
                let value = self.read_string()?;
                Ok(Token::new(TokenType::StringLiteral, value, start))
            }
            '`' => {
                let value = self.read_delimited_identifier()?;
                Ok(Token::new(TokenType::DelimitedIdentifier, value, start))
            }
            '%' => {
                self.advance();
                let name = match self.current() {
                    Some('\'') => self.read_string()?,
                    Some(c2) if c2.is_ascii_alphanumeric() || c2 == '_' => self.read_identifier(),
                    _ => {
                        return Err(FhirPathError::ParseError {
                            position: start,
                            message: "expected constant name after '%'".to_string(),
                        });
                    }
                };
                Ok(Token::new(TokenType::ExternalConstant, name, start))
            }
            '$' => {
                self.advance();
                let word = self.read_identifier();
                if word == "this" {
                    Ok(Token::new(TokenType::This, "$this".to_string(), start))
                } else {
                    Err(FhirPathError::ParseError {
                        position: start,
                        message: format!("unsupported special variable '${}'", word),
                    })
                }
            }
            '@' => {
                // Date/time literals are carried verbatim and compared as strings.
                self.advance();
                let mut value = String::new();
                while let Some(c2) = self.current() {
                    if c2.is_ascii_alphanumeric() || matches!(c2, '-' | ':' | '+' | '.' | 'T' | 'Z') {
                        value.push(c2);
                        self.advance();
                    } else {
                        break;
                    }
                }
                Ok(Token::new(TokenType::DateTimeLiteral, value, start))
            }
            '.' => self.single(TokenType::Dot, start),
            '[' => self.single(TokenType::OpenBracket, start),
            ']' => self.single(TokenType::CloseBracket, start),
            '(' => self.single(TokenType::OpenParen, start),
            ')' => self.single(TokenType::CloseParen, start),
            '{' => self.single(TokenType::OpenBrace, start),
            '}' => self.single(TokenType::CloseBrace, start),
            ',' => self.single(TokenType::Comma, start),
            '+' => self.single(TokenType::Plus, start),
            '-' => self.single(TokenType::Minus, start),
            '*' => self.single(TokenType::Multiply, start),
            '/' => self.single(TokenType::Divide, start),
            '&' => self.single(TokenType::Ampersand, start),
            '|' => self.single(TokenType::Pipe, start),
            '=' => self.single(TokenType::Equal, start),
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::new(TokenType::LessThanOrEqual, "<=".to_string(), start))
                } else {
                    self.single(TokenType::LessThan, start)
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::new(TokenType::GreaterThanOrEqual, ">=".to_string(), start))
                } else {
                    self.single(TokenType::GreaterThan, start)
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::new(TokenType::NotEqual, "!=".to_string(), start))
                } else {
                    Err(FhirPathError::ParseError {
                        position: start,
                        message: "expected '=' after '!'".to_string(),
                    })
                }
            }
            other => Err(FhirPathError::ParseError {
                position: start,
                message: format!("unexpected character '{}'", other),
            }),
        }
    }

    fn single(&mut self, token_type: TokenType, start: usize) -> Result<Token> {
        let value = self.current().map(String::from).unwrap_or_default();
        self.advance();
        Ok(Token::new(token_type, value, start))
    }

    fn read_identifier(&mut self) -> String {
        let start = self.position;
        while matches!(self.current(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        self.chars[start..self.position].iter().collect()
    }

    fn read_number(&mut self) -> String {
        let start = self.position;
        while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        // Fractional part only when a digit follows the dot, so that
        // `5.value` stays a member access on the integer 5.
        if self.current() == Some('.') && matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
            while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        self.chars[start..self.position].iter().collect()
    }

    fn read_string(&mut self) -> Result<String> {
        let start = self.position;
        self.advance(); // opening quote
        let mut value = String::new();
        while let Some(c) = self.current() {
            match c {
                '\'' => {
                    self.advance();
                    return Ok(value);
                }
                '\\' => {
                    self.advance();
                    let escaped = self.current().ok_or(FhirPathError::ParseError {
                        position: self.position,
                        message: "unterminated escape sequence".to_string(),
                    })?;
                    value.push(match escaped {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        '\\' => '\\',
                        '\'' => '\'',
                        '"' => '"',
                        '`' => '`',
                        '/' => '/',
                        'f' => '\u{000C}',
                        other => {
                            return Err(FhirPathError::ParseError {
                                position: self.position,
                                message: format!("invalid escape sequence '\\{}'", other),
                            });
                        }
                    });
                    self.advance();
                }
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        Err(FhirPathError::ParseError {
            position: start,
            message: "unterminated string literal".to_string(),
        })
    }

    fn read_delimited_identifier(&mut self) -> Result<String> {
        let start = self.position;
        self.advance(); // opening backtick
        let mut value = String::new();
        while let Some(c) = self.current() {
            if c == '`' {
                self.advance();
                return Ok(value);
            }
            value.push(c);
            self.advance();
        }
        Err(FhirPathError::ParseError {
            position: start,
            message: "unterminated delimited identifier".to_string(),
        })
    }
}

//! Recursive-descent parser for the FHIRPath grammar subset.
//!
//! Precedence, loosest to tightest: `or`/`xor`, `and`, equality,
//! inequality, union `|`, additive (`+` `-` `&`), multiplicative
//! (`*` `/` `div` `mod`), unary polarity, postfix (`.` invocation and
//! `[ ]` indexer), term.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::ast::{AstNode, BinaryOperator};
use crate::error::{FhirPathError, Result};
use crate::lexer::Lexer;
use crate::token::{Token, TokenType};

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

/// Parse an expression string into an AST.
pub fn parse(input: &str) -> Result<AstNode> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let node = parser.parse_or_expression()?;
    parser.expect(TokenType::Eof)?;
    Ok(node)
}

impl Parser {
    fn current(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.position].clone();
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.current().token_type == token_type
    }

    fn eat(&mut self, token_type: TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token_type: TokenType) -> Result<Token> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            let token = self.current();
            Err(FhirPathError::ParseError {
                position: token.position,
                message: format!("expected {:?}, found '{}'", token_type, token.value),
            })
        }
    }

    fn parse_or_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_and_expression()?;
        loop {
            let operator = match self.current().token_type {
                TokenType::Or => BinaryOperator::Or,
                TokenType::Xor => BinaryOperator::Xor,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_and_expression()?;
            left = AstNode::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }
    }

    fn parse_and_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_equality_expression()?;
        while self.eat(TokenType::And) {
            let right = self.parse_equality_expression()?;
            left = AstNode::Binary {
                left: Box::new(left),
                operator: BinaryOperator::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_inequality_expression()?;
        loop {
            let operator = match self.current().token_type {
                TokenType::Equal => BinaryOperator::Equal,
                TokenType::NotEqual => BinaryOperator::NotEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_inequality_expression()?;
            left = AstNode::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }
    }

    fn parse_inequality_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_union_expression()?;
        loop {
            let operator = match self.current().token_type {
                TokenType::LessThan => BinaryOperator::LessThan,
                TokenType::LessThanOrEqual => BinaryOperator::LessThanOrEqual,
                TokenType::GreaterThan => BinaryOperator::GreaterThan,
                TokenType::GreaterThanOrEqual => BinaryOperator::GreaterThanOrEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_union_expression()?;
            left = AstNode::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }
    }

    fn parse_union_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_additive_expression()?;
        while self.eat(TokenType::Pipe) {
            let right = self.parse_additive_expression()?;
            left = AstNode::Binary {
                left: Box::new(left),
                operator: BinaryOperator::Union,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_multiplicative_expression()?;
        loop {
            let operator = match self.current().token_type {
                TokenType::Plus => BinaryOperator::Add,
                TokenType::Minus => BinaryOperator::Subtract,
                TokenType::Ampersand => BinaryOperator::Concat,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative_expression()?;
            left = AstNode::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }
    }

    fn parse_multiplicative_expression(&mut self) -> Result<AstNode> {
        let mut left = self.parse_polarity_expression()?;
        loop {
            let operator = match self.current().token_type {
                TokenType::Multiply => BinaryOperator::Multiply,
                TokenType::Divide => BinaryOperator::Divide,
                TokenType::Div => BinaryOperator::Div,
                TokenType::Mod => BinaryOperator::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_polarity_expression()?;
            left = AstNode::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }
    }

    fn parse_polarity_expression(&mut self) -> Result<AstNode> {
        match self.current().token_type {
            TokenType::Minus => {
                self.advance();
                let operand = self.parse_polarity_expression()?;
                Ok(AstNode::Polarity {
                    negate: true,
                    operand: Box::new(operand),
                })
            }
            TokenType::Plus => {
                self.advance();
                self.parse_polarity_expression()
            }
            _ => self.parse_postfix_expression(),
        }
    }

    fn parse_postfix_expression(&mut self) -> Result<AstNode> {
        let mut expr = self.parse_term()?;
        loop {
            if self.eat(TokenType::Dot) {
                let invocation = self.parse_invocation()?;
                expr = AstNode::Invocation {
                    target: Box::new(expr),
                    invocation: Box::new(invocation),
                };
            } else if self.eat(TokenType::OpenBracket) {
                let index = self.parse_or_expression()?;
                self.expect(TokenType::CloseBracket)?;
                expr = AstNode::Indexer {
                    collection: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// An invocation is what follows a `.`: a member, a function call or `$this`.
    fn parse_invocation(&mut self) -> Result<AstNode> {
        let token = self.current().clone();
        match token.token_type {
            TokenType::Identifier | TokenType::DelimitedIdentifier => {
                self.advance();
                if self.check(TokenType::OpenParen) {
                    self.parse_function_call(token.value)
                } else {
                    Ok(AstNode::Member(token.value))
                }
            }
            TokenType::This => {
                self.advance();
                Ok(AstNode::This)
            }
            // `div`/`mod` and boolean words double as member names after a dot
            TokenType::Div | TokenType::Mod | TokenType::And | TokenType::Or | TokenType::Xor => {
                self.advance();
                Ok(AstNode::Member(token.value))
            }
            _ => Err(FhirPathError::ParseError {
                position: token.position,
                message: format!("expected member or function after '.', found '{}'", token.value),
            }),
        }
    }

    fn parse_function_call(&mut self, name: String) -> Result<AstNode> {
        self.expect(TokenType::OpenParen)?;
        let mut args = Vec::new();
        if !self.check(TokenType::CloseParen) {
            loop {
                args.push(self.parse_or_expression()?);
                if !self.eat(TokenType::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenType::CloseParen)?;
        Ok(AstNode::Function { name, args })
    }

    fn parse_term(&mut self) -> Result<AstNode> {
        let token = self.current().clone();
        match token.token_type {
            TokenType::True => {
                self.advance();
                Ok(AstNode::BooleanLiteral(true))
            }
            TokenType::False => {
                self.advance();
                Ok(AstNode::BooleanLiteral(false))
            }
            TokenType::NumberLiteral => {
                self.advance();
                if token.value.contains('.') {
                    let value =
                        Decimal::from_str(&token.value).map_err(|e| FhirPathError::ParseError {
                            position: token.position,
                            message: format!("invalid decimal literal: {}", e),
                        })?;
                    Ok(AstNode::DecimalLiteral(value))
                } else {
                    let value =
                        token.value.parse::<i64>().map_err(|e| FhirPathError::ParseError {
                            position: token.position,
                            message: format!("invalid integer literal: {}", e),
                        })?;
                    Ok(AstNode::IntegerLiteral(value))
                }
            }
            TokenType::StringLiteral => {
                self.advance();
                Ok(AstNode::StringLiteral(token.value))
            }
            TokenType::DateTimeLiteral => {
                self.advance();
                Ok(AstNode::DateTimeLiteral(token.value))
            }
            TokenType::This => {
                self.advance();
                Ok(AstNode::This)
            }
            TokenType::ExternalConstant => {
                self.advance();
                Ok(AstNode::ExternalConstant(token.value))
            }
            TokenType::Identifier | TokenType::DelimitedIdentifier => {
                self.advance();
                if self.check(TokenType::OpenParen) {
                    self.parse_function_call(token.value)
                } else {
                    Ok(AstNode::Member(token.value))
                }
            }
            TokenType::OpenParen => {
                self.advance();
                let inner = self.parse_or_expression()?;
                self.expect(TokenType::CloseParen)?;
                Ok(inner)
            }
            TokenType::OpenBrace => {
                self.advance();
                self.expect(TokenType::CloseBrace)?;
                Ok(AstNode::EmptyLiteral)
            }
            _ => Err(FhirPathError::ParseError {
                position: token.position,
                message: format!("unexpected token '{}'", token.value),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_member_chain() {
        let node = parse("name.family").unwrap();
        match node {
            AstNode::Invocation { target, invocation } => {
                assert_eq!(*target, AstNode::Member("name".to_string()));
                assert_eq!(*invocation, AstNode::Member("family".to_string()));
            }
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_with_string_arg() {
        let node = parse("line.join('\\n')").unwrap();
        match node {
            AstNode::Invocation { invocation, .. } => match *invocation {
                AstNode::Function { name, args } => {
                    assert_eq!(name, "join");
                    assert_eq!(args, vec![AstNode::StringLiteral("\n".to_string())]);
                }
                other => panic!("unexpected invocation: {:?}", other),
            },
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_parse_equality_against_boolean() {
        let node = parse("active = true").unwrap();
        match node {
            AstNode::Binary { operator, .. } => assert_eq!(operator, BinaryOperator::Equal),
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_parse_precedence_and_over_or() {
        // a or b and c  =>  a or (b and c)
        let node = parse("a or b and c").unwrap();
        match node {
            AstNode::Binary { operator, right, .. } => {
                assert_eq!(operator, BinaryOperator::Or);
                match *right {
                    AstNode::Binary { operator, .. } => {
                        assert_eq!(operator, BinaryOperator::And)
                    }
                    other => panic!("unexpected rhs: {:?}", other),
                }
            }
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_parse_indexer() {
        let node = parse("name[0].given[1]").unwrap();
        match node {
            AstNode::Indexer { .. } => {}
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_literal() {
        assert_eq!(parse("{}").unwrap(), AstNode::EmptyLiteral);
    }

    #[test]
    fn test_parse_getreferencekey() {
        let node = parse("subject.getReferenceKey('Patient')").unwrap();
        match node {
            AstNode::Invocation { invocation, .. } => match *invocation {
                AstNode::Function { name, args } => {
                    assert_eq!(name, "getReferenceKey");
                    assert_eq!(args.len(), 1);
                }
                other => panic!("unexpected invocation: {:?}", other),
            },
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_parse_trailing_garbage_rejected() {
        assert!(parse("name )").is_err());
    }

    #[test]
    fn test_parse_union() {
        let node = parse("name.family | name.given").unwrap();
        match node {
            AstNode::Binary { operator, .. } => assert_eq!(operator, BinaryOperator::Union),
            other => panic!("unexpected node: {:?}", other),
        }
    }
}

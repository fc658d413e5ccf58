//! Abstract syntax tree for the supported FHIRPath grammar subset.

use rust_decimal::Decimal;

/// A parsed FHIRPath expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// Empty collection literal: `{}`
    EmptyLiteral,
    /// `true` / `false`
    BooleanLiteral(bool),
    /// Integer literal
    IntegerLiteral(i64),
    /// Decimal literal
    DecimalLiteral(Decimal),
    /// String literal
    StringLiteral(String),
    /// Date/time literal (`@2024-01-01`), carried as its string form
    DateTimeLiteral(String),

    /// `$this` - the current evaluation focus
    This,
    /// `%name` - an external constant
    ExternalConstant(String),
    /// Bare member access: `name`
    Member(String),
    /// Function invocation: `name(args...)`
    Function { name: String, args: Vec<AstNode> },

    /// `expression '.' invocation`
    Invocation {
        target: Box<AstNode>,
        invocation: Box<AstNode>,
    },
    /// `expression '[' index ']'`
    Indexer {
        collection: Box<AstNode>,
        index: Box<AstNode>,
    },

    /// `('+' | '-') expression`
    Polarity {
        negate: bool,
        operand: Box<AstNode>,
    },
    /// Binary operator application
    Binary {
        left: Box<AstNode>,
        operator: BinaryOperator,
        right: Box<AstNode>,
    },
}

/// Binary operators, ordered here roughly by binding strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Multiply,
    Divide,
    Div,
    Mod,
    Add,
    Subtract,
    Concat, // &
    Union,  // |
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Equal,
    NotEqual,
    And,
    Or,
    Xor,
}

//! Tokens produced by the GPR lexer

#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub enum Token {
    /// Gene id
    Identifier(String),
    And,
    Or,
    Not,
    LeftParen,
    RightParen,
    Eof,
}

//! Lex a GPR string into a series of tokens for later parsing

use thiserror::Error;

use crate::io::gpr_parse::token::Token;

pub struct Lexer {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
        }
    }

    /// Consume the source, producing the token list terminated by [`Token::Eof`]
    pub fn lex(mut self) -> Result<Vec<Token>, LexerError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }

        self.tokens.push(Token::Eof);
        Ok(self.tokens)
    }

    fn scan_token(&mut self) -> Result<(), LexerError> {
        let c: char = self.advance();
        match c {
            // Single Character Tokens
            '(' => self.add_token(Token::LeftParen),
            ')' => self.add_token(Token::RightParen),
            // Whitespace
            ' ' | '\r' | '\n' | '\t' => {}
            // Identifiers and Operators
            c if Lexer::is_identifier_char(c) => self.read_identifier(),
            other => return Err(LexerError::InvalidToken(other)),
        };
        Ok(())
    }

    fn advance(&mut self) -> char {
        let char_at_current = self.source[self.current];
        self.current += 1;
        char_at_current
    }

    fn read_identifier(&mut self) {
        while !self.is_at_end() && Lexer::is_identifier_char(self.peek()) {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();

        match text.as_str() {
            "and" | "And" | "AND" => self.add_token(Token::And),
            "or" | "Or" | "OR" => self.add_token(Token::Or),
            "not" | "Not" | "NOT" => self.add_token(Token::Not),
            gene => self.add_token(Token::Identifier(gene.to_string())),
        }
    }

    /// Gene ids seen in published models use letters, digits and `_ . - :`
    fn is_identifier_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':')
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            return '\0';
        }
        self.source[self.current]
    }

    fn add_token(&mut self, token: Token) {
        self.tokens.push(token);
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexerError {
    #[error("Invalid character `{0}` in GPR rule")]
    InvalidToken(char),
}

#[cfg(test)]
mod tests {
    use crate::io::gpr_parse::lexer::{Lexer, LexerError};
    use crate::io::gpr_parse::token::Token;

    #[test]
    fn test_single_gene() {
        let tokens = Lexer::new("Rv0023").lex().unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0], Token::Identifier(String::from("Rv0023")));
    }

    #[test]
    fn test_grouping() {
        let tokens = Lexer::new("(Rv0023 or Rv0123)").lex().unwrap();
        let expected_tokens = vec![
            Token::LeftParen,
            Token::Identifier(String::from("Rv0023")),
            Token::Or,
            Token::Identifier(String::from("Rv0123")),
            Token::RightParen,
            Token::Eof,
        ];
        assert_eq!(tokens, expected_tokens);
    }

    #[test]
    fn numeric_gene_ids() {
        // Recon style entrez ids
        let tokens = Lexer::new("10026.1 AND not 8347.1").lex().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Identifier(String::from("10026.1")),
                Token::And,
                Token::Not,
                Token::Identifier(String::from("8347.1")),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn invalid_character() {
        assert_eq!(
            Lexer::new("b0001 & b0002").lex(),
            Err(LexerError::InvalidToken('&'))
        );
    }
}

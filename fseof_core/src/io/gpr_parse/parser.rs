use crate::io::gpr_parse::token::Token;
use crate::metabolic_model::gene::Gene;
use crate::metabolic_model::model::{Gpr, GprOperatorType};

use indexmap::IndexMap;
use thiserror::Error;
/*
GPR Grammar:
expression -> binary
binary -> unary (("AND" | "OR") unary )*;
unary -> "NOT" unary | primary  ;
primary -> GENE | "(" expression ")" ;

e.g. ( Gene1 AND Gene2) OR (Gene3 AND NOT Gene4)
 */

/// GPR Parser
pub struct GPRParser<'gm> {
    /// Vector of tokens from the GPR string
    tokens: Vec<Token>,
    /// Current token being processed
    current: usize,
    /// Map containing the Genes, genes seen in the rule but missing here are added
    pub(crate) gene_map: &'gm mut IndexMap<String, Gene>,
}

impl<'gm> GPRParser<'gm> {
    /// Create a new GPRParser
    ///
    /// `tokens` is expected to end with [`Token::Eof`], as produced by the lexer.
    pub fn new(tokens: Vec<Token>, gene_map: &'gm mut IndexMap<String, Gene>) -> GPRParser<'gm> {
        GPRParser {
            tokens,
            current: 0,
            gene_map,
        }
    }

    // region Parsing Functions

    /// Parse the token vector into a GPR AST
    pub fn parse(&mut self) -> Result<Gpr, ParseError> {
        let gpr = self.binary()?;
        if !self.is_at_end() {
            // If entire expression has not been parsed, an error has occurred
            return Err(ParseError::EarlyTermination);
        }
        Ok(gpr)
    }

    fn binary(&mut self) -> Result<Gpr, ParseError> {
        let mut expr = self.unary()?;

        while self.match_token(&[Token::And, Token::Or]) {
            let operator: GprOperatorType = match self.previous() {
                Token::Or => GprOperatorType::Or,
                Token::And => GprOperatorType::And,
                _ => return Err(ParseError::InvalidBinaryOperator),
            };
            let right = self.unary()?;
            expr = Gpr::new_binary_operation(expr, operator, right)
                .map_err(|_| ParseError::InvalidBinaryOperator)?;
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Gpr, ParseError> {
        if self.match_token(&[Token::Not]) {
            let right = self.unary()?;
            return Gpr::new_unary_operation(GprOperatorType::Not, right)
                .map_err(|_| ParseError::InvalidUnaryOperator);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Gpr, ParseError> {
        if let Some(identifier) = self.match_identifier() {
            self.insert_if_needed(&identifier);
            return Ok(Gpr::new_gene_node(&identifier));
        }

        if self.match_token(&[Token::LeftParen]) {
            let expr = self.binary()?;
            self.consume(Token::RightParen, "Expect ')' after expression.")?;
            return Ok(expr);
        }

        Err(ParseError::ExpectedExpression)
    }

    // endregion Parsing Functions

    // region parsing helper functions

    /// Check whether the token at the current position matches one of the provided `tokens`,
    /// if it does advance [`self.current`] and return true, otherwise return false
    fn match_token(&mut self, tokens: &[Token]) -> bool {
        for t in tokens {
            if self.check(t) {
                self.advance();
                return true;
            }
        }
        false
    }

    /// Similar to [`match_token`], but for matching an identifier token. If the current
    /// token is an identifier return `Some(GeneId)`, otherwise return None
    fn match_identifier(&mut self) -> Option<String> {
        if let Token::Identifier(id) = self.peek() {
            let id = id.clone();
            self.advance();
            return Some(id);
        }
        None
    }

    /// Check whether the current token matches the provided `token`
    fn check(&self, token: &Token) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek() == token
    }

    /// Advance `self.current` one position unless at end of GPR Vec, then return the previous
    /// token.
    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    /// Check whether the parser is at the end of the source Vec
    fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    /// The current token; a missing trailing Eof reads as Eof
    fn peek(&self) -> &Token {
        self.tokens.get(self.current).unwrap_or(&Token::Eof)
    }

    /// The previous token
    fn previous(&self) -> &Token {
        self.tokens
            .get(self.current.saturating_sub(1))
            .unwrap_or(&Token::Eof)
    }

    /// Check whether the current token matches an input token, if it matches advance to the
    /// next token, and if it doesn't return an error. Used mainly for matching parenthesis in
    /// source GPR vec.
    fn consume(&mut self, token: Token, msg: &str) -> Result<(), ParseError> {
        if self.check(&token) {
            self.advance();
            return Ok(());
        }

        Err(ParseError::MissingToken(msg.to_string()))
    }

    // endregion parsing helper functions

    // region Gene Map Functions

    /// Check if a gene_id exists as a key in gene_map, if it doesn't insert a new gene with that id
    fn insert_if_needed(&mut self, gene_id: &str) {
        if !self.gene_map.contains_key(gene_id) {
            self.gene_map
                .insert(gene_id.to_string(), Gene::new(gene_id));
        }
    }

    // endregion Gene Map Functions
}

/// Enum representing possible parse errors
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ParseError {
    /// Token was expected to be a binary operator but was not
    #[error("Invalid binary operator encountered, expected only `and` and `or`")]
    InvalidBinaryOperator,
    /// Token was expected to be a unary operator but was not
    #[error("Invalid unary operator encountered, expected only `not`")]
    InvalidUnaryOperator,
    /// Missing expected token (e.g. a right parenthesis)
    #[error("Missing expected token: {0}")]
    MissingToken(String),
    /// No expression found when one was expected
    #[error("No expression found, check that the GPR string is not empty")]
    ExpectedExpression,
    /// Expression was not completed when parsing terminated
    #[error("Parsing terminated early, check for a `not` between two gene identifiers/grouped expressions")]
    EarlyTermination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::gpr_parse::lexer::Lexer;
    use crate::metabolic_model::model::GprOperation;

    fn parse(rule: &str) -> (Result<Gpr, ParseError>, IndexMap<String, Gene>) {
        let token_vec: Vec<Token> = Lexer::new(rule).lex().unwrap();
        let mut gene_map = IndexMap::new();
        let res = GPRParser::new(token_vec, &mut gene_map).parse();
        (res, gene_map)
    }

    fn gene(id: &str) -> Box<Gpr> {
        Box::new(Gpr::GeneNode(id.to_string()))
    }

    #[test]
    fn single_gene_parse() {
        let (gpr, genes) = parse("Rv1304");
        assert_eq!(gpr.unwrap(), Gpr::GeneNode("Rv1304".to_string()));
        assert!(genes.contains_key("Rv1304"));
    }

    #[test]
    fn and_parse() {
        let (gpr, _) = parse("Rv1304 and Rv0023");
        assert_eq!(
            gpr.unwrap(),
            Gpr::Operation(GprOperation::And {
                left: gene("Rv1304"),
                right: gene("Rv0023"),
            })
        );
    }

    #[test]
    fn or_parse() {
        let (gpr, _) = parse("Rv1304 or Rv0023");
        assert_eq!(
            gpr.unwrap(),
            Gpr::Operation(GprOperation::Or {
                left: gene("Rv1304"),
                right: gene("Rv0023"),
            })
        );
    }

    #[test]
    fn not_parse() {
        let (gpr, _) = parse("not Rv0023");
        assert_eq!(
            gpr.unwrap(),
            Gpr::Operation(GprOperation::Not {
                val: gene("Rv0023")
            })
        );
    }

    #[test]
    fn grouping_parse() {
        let (gpr, genes) = parse("(Rv3141 or Rv0023) and Rv018");
        assert_eq!(
            gpr.unwrap(),
            Gpr::Operation(GprOperation::And {
                left: Box::new(Gpr::Operation(GprOperation::Or {
                    left: gene("Rv3141"),
                    right: gene("Rv0023"),
                })),
                right: gene("Rv018"),
            })
        );
        assert_eq!(genes.len(), 3);
    }

    #[test]
    fn malformed_rules() {
        assert_eq!(parse("").0, Err(ParseError::ExpectedExpression));
        assert!(matches!(
            parse("(Rv0001 or Rv0002").0,
            Err(ParseError::MissingToken(_))
        ));
        assert_eq!(
            parse("Rv0001 Rv0002").0,
            Err(ParseError::EarlyTermination)
        );
    }
}

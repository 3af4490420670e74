use super::PredicateError;
use super::lexer::{Spanned, Token};
use crate::ast::{Comparison, Expression, Value};

/// Recursive-descent parser over the closed predicate grammar:
///
/// ```text
/// or         := and (OR and)*
/// and        := unary (AND unary)*
/// unary      := NOT unary | primary
/// primary    := "(" or ")" | comparison
/// comparison := IDENT [ op literal | [NOT] IN "[" literal ("," literal)* "]" ]
/// ```
pub(super) struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    end_offset: usize,
}

impl<'a> Parser<'a> {
    pub(super) fn new(tokens: &'a [Spanned], end_offset: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end_offset,
        }
    }

    pub(super) fn parse(mut self) -> Result<Expression, PredicateError> {
        if self.tokens.is_empty() {
            return Err(PredicateError::new(0, "empty predicate"));
        }
        let expr = self.parse_or()?;
        if let Some(extra) = self.tokens.get(self.pos) {
            return Err(PredicateError::new(
                extra.offset,
                format!("unexpected trailing {:?}", extra.token),
            ));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.offset)
            .unwrap_or(self.end_offset)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos).map(|s| &s.token);
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), PredicateError> {
        let offset = self.offset();
        match self.advance() {
            Some(token) if *token == expected => Ok(()),
            Some(token) => Err(PredicateError::new(
                offset,
                format!("expected {}, found {:?}", what, token),
            )),
            None => Err(PredicateError::new(offset, format!("expected {}", what))),
        }
    }

    fn parse_or(&mut self) -> Result<Expression, PredicateError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, PredicateError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, PredicateError> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expression::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, PredicateError> {
        let offset = self.offset();
        match self.advance().cloned() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(field)) => self.parse_comparison(field),
            Some(other) => Err(PredicateError::new(
                offset,
                format!("expected a field name, found {:?}", other),
            )),
            None => Err(PredicateError::new(offset, "expected a field name")),
        }
    }

    fn parse_comparison(&mut self, field: String) -> Result<Expression, PredicateError> {
        match self.peek().cloned() {
            Some(Token::Op(symbol)) => {
                self.advance();
                let op = match symbol {
                    "==" => Comparison::Equal,
                    "!=" => Comparison::NotEqual,
                    "<" => Comparison::LessThan,
                    "<=" => Comparison::LessThanOrEqual,
                    ">" => Comparison::GreaterThan,
                    _ => Comparison::GreaterThanOrEqual,
                };
                let literal_offset = self.offset();
                let value = self.parse_literal()?;
                if op.is_ordering() && value.as_number().is_none() {
                    return Err(PredicateError::new(
                        literal_offset,
                        format!("'{}' needs a numeric literal, found {}", symbol, value),
                    ));
                }
                Ok(Expression::Compare { field, op, value })
            }
            Some(Token::In) => {
                self.advance();
                let set = self.parse_set()?;
                Ok(Expression::Membership {
                    field,
                    set,
                    negated: false,
                })
            }
            Some(Token::Not)
                if matches!(self.tokens.get(self.pos + 1).map(|s| &s.token), Some(Token::In)) =>
            {
                self.advance();
                self.advance();
                let set = self.parse_set()?;
                Ok(Expression::Membership {
                    field,
                    set,
                    negated: true,
                })
            }
            _ => Ok(Expression::Truthy(field)),
        }
    }

    fn parse_set(&mut self) -> Result<Vec<Value>, PredicateError> {
        self.expect(Token::LBracket, "'['")?;
        let mut set = Vec::new();
        if self.peek() == Some(&Token::RBracket) {
            self.advance();
            return Ok(set);
        }
        loop {
            set.push(self.parse_literal()?);
            let offset = self.offset();
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => break,
                _ => return Err(PredicateError::new(offset, "expected ',' or ']'")),
            }
        }
        Ok(set)
    }

    fn parse_literal(&mut self) -> Result<Value, PredicateError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Number(n)) => Ok(Value::Number(*n)),
            Some(Token::Text(s)) => Ok(Value::Text(s.clone())),
            Some(Token::True) => Ok(Value::Bool(true)),
            Some(Token::False) => Ok(Value::Bool(false)),
            Some(Token::Null) => Ok(Value::Null),
            Some(other) => Err(PredicateError::new(
                offset,
                format!("expected a literal, found {:?}", other),
            )),
            None => Err(PredicateError::new(offset, "expected a literal")),
        }
    }
}

//! Compiles predicate text into typed [`Expression`] trees.
//!
//! Predicates are compiled exactly once, when a flow is built. The runtime
//! evaluator only ever walks the resulting tree.

use crate::ast::Expression;
use thiserror::Error;

mod lexer;
mod parser;

/// A syntax error in predicate text, with the byte offset it was detected at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at offset {position})")]
pub struct PredicateError {
    pub position: usize,
    pub message: String,
}

impl PredicateError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Parses a predicate such as `budget_amount > 50000 AND priority == "urgent"`.
pub fn compile_predicate(source: &str) -> Result<Expression, PredicateError> {
    let tokens = lexer::tokenize(source)?;
    parser::Parser::new(&tokens, source.len()).parse()
}

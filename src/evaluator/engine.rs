use crate::ast::{Comparison, EvaluationTrace, Expression, Value};
use crate::data::Payload;
use crate::error::EvaluationError;
use tracing::warn;

use super::MissingFieldPolicy;

/// The core recursive engine for evaluating one predicate tree against a payload.
pub(super) struct PredicateEngine<'a> {
    node_id: &'a str,
    payload: &'a Payload,
    policy: MissingFieldPolicy,
}

impl<'a> PredicateEngine<'a> {
    pub(super) fn new(node_id: &'a str, payload: &'a Payload, policy: MissingFieldPolicy) -> Self {
        Self {
            node_id,
            payload,
            policy,
        }
    }

    /// Evaluates the expression and returns a trace of the values it read.
    ///
    /// Under [`MissingFieldPolicy::FallThrough`] a leaf that cannot be evaluated
    /// becomes a false [`EvaluationTrace::Unresolved`] and the surrounding
    /// `AND`/`OR`/`NOT` combine it like any other leaf.
    pub(super) fn evaluate(&self, expr: &Expression) -> Result<EvaluationTrace, EvaluationError> {
        match expr {
            Expression::Compare { field, op, value } => {
                self.settle(field, self.eval_comparison(field, *op, value))
            }
            Expression::Membership {
                field,
                set,
                negated,
            } => self.settle(field, self.eval_membership(field, set, *negated)),
            Expression::Truthy(field) => {
                let result = self.lookup(field).map(|actual| EvaluationTrace::Truthiness {
                    field: field.clone(),
                    actual: actual.clone(),
                    outcome: actual.is_truthy(),
                });
                self.settle(field, result)
            }
            Expression::Not(inner) => {
                let child = self.evaluate(inner)?;
                let outcome = !child.get_outcome();
                Ok(EvaluationTrace::Not {
                    child: Box::new(child),
                    outcome,
                })
            }
            Expression::And(l, r) => {
                let left = self.evaluate(l)?;
                if !left.get_outcome() {
                    return Ok(EvaluationTrace::Logical {
                        op_symbol: "AND",
                        left: Box::new(left),
                        right: Box::new(EvaluationTrace::NotEvaluated),
                        outcome: false,
                    });
                }
                let right = self.evaluate(r)?;
                let outcome = right.get_outcome();
                Ok(EvaluationTrace::Logical {
                    op_symbol: "AND",
                    left: Box::new(left),
                    right: Box::new(right),
                    outcome,
                })
            }
            Expression::Or(l, r) => {
                let left = self.evaluate(l)?;
                if left.get_outcome() {
                    return Ok(EvaluationTrace::Logical {
                        op_symbol: "OR",
                        left: Box::new(left),
                        right: Box::new(EvaluationTrace::NotEvaluated),
                        outcome: true,
                    });
                }
                let right = self.evaluate(r)?;
                let outcome = right.get_outcome();
                Ok(EvaluationTrace::Logical {
                    op_symbol: "OR",
                    left: Box::new(left),
                    right: Box::new(right),
                    outcome,
                })
            }
        }
    }

    fn settle(
        &self,
        field: &str,
        result: Result<EvaluationTrace, EvaluationError>,
    ) -> Result<EvaluationTrace, EvaluationError> {
        match (result, self.policy) {
            (Err(e), MissingFieldPolicy::FallThrough) => {
                warn!(
                    node = %self.node_id,
                    error = %e,
                    "predicate leaf could not be evaluated, treating it as false"
                );
                let reason = match e {
                    EvaluationError::TypeMismatch { found, .. } => {
                        format!("was {}, not a number", found)
                    }
                    _ => "missing".to_string(),
                };
                Ok(EvaluationTrace::Unresolved {
                    field: field.to_string(),
                    reason,
                })
            }
            (result, _) => result,
        }
    }

    fn eval_membership(
        &self,
        field: &str,
        set: &[Value],
        negated: bool,
    ) -> Result<EvaluationTrace, EvaluationError> {
        let actual = self.lookup(field)?;
        let found = match actual {
            Value::List(items) => items
                .iter()
                .any(|item| set.iter().any(|v| item.loosely_equals(v))),
            single => set.iter().any(|v| single.loosely_equals(v)),
        };
        Ok(EvaluationTrace::Membership {
            field: field.to_string(),
            actual: actual.clone(),
            set: set.to_vec(),
            negated,
            outcome: found != negated,
        })
    }

    fn eval_comparison(
        &self,
        field: &str,
        op: Comparison,
        expected: &Value,
    ) -> Result<EvaluationTrace, EvaluationError> {
        let actual = self.lookup(field)?;
        let outcome = match op {
            Comparison::Equal => actual.loosely_equals(expected),
            Comparison::NotEqual => !actual.loosely_equals(expected),
            ordering => {
                let lhs = actual
                    .as_number()
                    .ok_or_else(|| self.type_mismatch(field, ordering, expected, actual))?;
                let rhs = expected
                    .as_number()
                    .ok_or_else(|| self.type_mismatch(field, ordering, expected, expected))?;
                match ordering {
                    Comparison::LessThan => lhs < rhs,
                    Comparison::LessThanOrEqual => lhs <= rhs,
                    Comparison::GreaterThan => lhs > rhs,
                    _ => lhs >= rhs,
                }
            }
        };
        Ok(EvaluationTrace::Comparison {
            op_symbol: op.symbol(),
            field: field.to_string(),
            actual: actual.clone(),
            expected: expected.clone(),
            outcome,
        })
    }

    fn lookup(&self, field: &str) -> Result<&'a Value, EvaluationError> {
        self.payload
            .get(field)
            .ok_or_else(|| EvaluationError::MissingField {
                node_id: self.node_id.to_string(),
                field: field.to_string(),
            })
    }

    fn type_mismatch(
        &self,
        field: &str,
        op: Comparison,
        expected: &Value,
        found: &Value,
    ) -> EvaluationError {
        EvaluationError::TypeMismatch {
            node_id: self.node_id.to_string(),
            field: field.to_string(),
            operation: format!("{} {}", op.symbol(), expected),
            expected: "Number".to_string(),
            found: found.clone(),
        }
    }
}

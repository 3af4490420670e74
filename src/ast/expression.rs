use super::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Comparison operators available to a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
            Comparison::LessThan => "<",
            Comparison::LessThanOrEqual => "<=",
            Comparison::GreaterThan => ">",
            Comparison::GreaterThanOrEqual => ">=",
        }
    }

    /// Whether the operator needs both sides to be numeric.
    pub fn is_ordering(&self) -> bool {
        !matches!(self, Comparison::Equal | Comparison::NotEqual)
    }
}

/// The typed predicate tree a condition branch is compiled into.
///
/// Field references only ever appear on the left of a comparison and literals
/// on the right, so evaluation never has to interpret text at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Compare {
        field: String,
        op: Comparison,
        value: Value,
    },
    Membership {
        field: String,
        set: Vec<Value>,
        negated: bool,
    },
    Truthy(String),
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

impl Expression {
    /// Collects every payload field the expression reads.
    pub fn get_required_fields(&self, fields: &mut BTreeSet<String>) {
        match self {
            Expression::Compare { field, .. }
            | Expression::Membership { field, .. }
            | Expression::Truthy(field) => {
                fields.insert(field.clone());
            }
            Expression::Not(inner) => inner.get_required_fields(fields),
            Expression::And(l, r) | Expression::Or(l, r) => {
                l.get_required_fields(fields);
                r.get_required_fields(fields);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expression::Or(..) => 1,
            Expression::And(..) => 2,
            Expression::Not(_) => 3,
            _ => 4,
        }
    }

    fn fmt_child(&self, child: &Expression, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if child.precedence() < self.precedence() {
            write!(f, "({})", child)
        } else {
            write!(f, "{}", child)
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Compare { field, op, value } => {
                write!(f, "{} {} {}", field, op.symbol(), value)
            }
            Expression::Membership {
                field,
                set,
                negated,
            } => {
                let keyword = if *negated { "NOT IN" } else { "IN" };
                write!(f, "{} {} {}", field, keyword, Value::List(set.clone()))
            }
            Expression::Truthy(field) => write!(f, "{}", field),
            Expression::Not(inner) => {
                write!(f, "NOT ")?;
                self.fmt_child(inner, f)
            }
            Expression::And(l, r) => {
                self.fmt_child(l, f)?;
                write!(f, " AND ")?;
                self.fmt_child(r, f)
            }
            Expression::Or(l, r) => {
                self.fmt_child(l, f)?;
                write!(f, " OR ")?;
                self.fmt_child(r, f)
            }
        }
    }
}

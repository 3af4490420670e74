use crate::ast::{EvaluationTrace, Value};
use itertools::Itertools;

/// Formats evaluation traces into human-readable strings
pub struct TraceFormatter;

impl TraceFormatter {
    /// Format an evaluation trace, e.g. `budget_amount (was 85000) > 50000`.
    pub fn format_trace(trace: &EvaluationTrace) -> String {
        Self::format_recursive(trace, 0)
    }

    /// Recursively formats the trace, adding parentheses only when necessary.
    fn format_recursive(trace: &EvaluationTrace, parent_precedence: u8) -> String {
        // A short-circuited operator is explained by its left side alone.
        if let EvaluationTrace::Logical { left, right, .. } = trace {
            if matches!(**right, EvaluationTrace::NotEvaluated) {
                return Self::format_recursive(left, parent_precedence);
            }
        }

        let current_precedence = trace.precedence();
        let needs_parens = current_precedence < parent_precedence;

        let body = match trace {
            EvaluationTrace::Comparison {
                op_symbol,
                field,
                actual,
                expected,
                ..
            } => format!(
                "{} (was {}) {} {}",
                field,
                Self::format_value(actual),
                op_symbol,
                Self::format_value(expected)
            ),
            EvaluationTrace::Membership {
                field,
                actual,
                set,
                negated,
                ..
            } => format!(
                "{} (was {}) {} [{}]",
                field,
                Self::format_value(actual),
                if *negated { "NOT IN" } else { "IN" },
                set.iter().map(Self::format_value).join(", ")
            ),
            EvaluationTrace::Truthiness { field, actual, .. } => {
                format!("{} (was {})", field, Self::format_value(actual))
            }
            EvaluationTrace::Unresolved { field, reason } => format!("{} ({})", field, reason),
            EvaluationTrace::Not { child, .. } => {
                format!("NOT {}", Self::format_recursive(child, current_precedence))
            }
            EvaluationTrace::Logical {
                op_symbol,
                left,
                right,
                ..
            } => {
                let left_str = Self::format_recursive(left, current_precedence);
                let right_str = Self::format_recursive(right, current_precedence);
                format!("{} {} {}", left_str, op_symbol, right_str)
            }
            EvaluationTrace::NotEvaluated => String::new(),
        };

        if needs_parens {
            format!("({})", body)
        } else {
            body
        }
    }

    fn format_value(value: &Value) -> String {
        value.to_string()
    }
}

use super::Value;

/// A record of how a predicate was evaluated, including the payload values it read.
#[derive(Debug, Clone)]
pub enum EvaluationTrace {
    Comparison {
        op_symbol: &'static str,
        field: String,
        actual: Value,
        expected: Value,
        outcome: bool,
    },
    Membership {
        field: String,
        actual: Value,
        set: Vec<Value>,
        negated: bool,
        outcome: bool,
    },
    Truthiness {
        field: String,
        actual: Value,
        outcome: bool,
    },
    Not {
        child: Box<EvaluationTrace>,
        outcome: bool,
    },
    Logical {
        op_symbol: &'static str,
        left: Box<EvaluationTrace>,
        right: Box<EvaluationTrace>,
        outcome: bool,
    },
    /// A leaf whose field was absent or not comparable; it counts as false.
    Unresolved {
        field: String,
        reason: String,
    },
    NotEvaluated,
}

impl EvaluationTrace {
    pub fn get_outcome(&self) -> bool {
        match self {
            EvaluationTrace::Comparison { outcome, .. }
            | EvaluationTrace::Membership { outcome, .. }
            | EvaluationTrace::Truthiness { outcome, .. }
            | EvaluationTrace::Not { outcome, .. }
            | EvaluationTrace::Logical { outcome, .. } => *outcome,
            EvaluationTrace::Unresolved { .. } | EvaluationTrace::NotEvaluated => false,
        }
    }

    pub fn precedence(&self) -> u8 {
        match self {
            EvaluationTrace::Logical { op_symbol, .. } => match *op_symbol {
                "OR" => 1,
                "AND" => 2,
                _ => 0,
            },
            EvaluationTrace::Not { .. } => 3,
            _ => 4,
        }
    }
}

//! Tests for predicate compilation and condition-node evaluation.
mod common;
use common::*;
use ringi::ast::Comparison;
use ringi::compiler::compile_predicate;
use ringi::flow::{Node, build};
use ringi::prelude::*;

/// Builds a one-condition flow and returns its condition node.
fn condition_node(branches: &[(&str, &str)], default: Option<&str>) -> Node {
    let flow = build(
        vec![
            condition("check", branches, default),
            end("high"),
            end("low"),
            end("fallback"),
        ],
        vec![],
    )
    .expect("condition should build");
    flow.node("check").cloned().expect("check node")
}

#[cfg(test)]
mod compiler_tests {
    use super::*;

    #[test]
    fn test_simple_comparison() {
        let expr = compile_predicate("budget_amount >= 50000").unwrap();
        assert_eq!(
            expr,
            Expression::Compare {
                field: "budget_amount".to_string(),
                op: Comparison::GreaterThanOrEqual,
                value: Value::Number(50000.0),
            }
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = compile_predicate("a > 1 OR b < 2 AND flag").unwrap();
        let Expression::Or(_, right) = &expr else {
            panic!("expected OR at the root, got {:?}", expr);
        };
        assert!(matches!(**right, Expression::And(..)));
        assert_eq!(expr.to_string(), "a > 1 OR b < 2 AND flag");
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let expr = compile_predicate("(a > 1 OR b < 2) AND flag").unwrap();
        assert!(matches!(expr, Expression::And(..)));
        assert_eq!(expr.to_string(), "(a > 1 OR b < 2) AND flag");
    }

    #[test]
    fn test_symbolic_and_lowercase_keywords() {
        let symbolic = compile_predicate("a == 1 && b != 'x' || !c").unwrap();
        let worded = compile_predicate("a == 1 and b != \"x\" or not c").unwrap();
        assert_eq!(symbolic, worded);
    }

    #[test]
    fn test_membership_and_negated_membership() {
        let expr = compile_predicate("department NOT IN [\"HR\", \"Finance\"]").unwrap();
        assert_eq!(
            expr,
            Expression::Membership {
                field: "department".to_string(),
                set: vec![Value::from("HR"), Value::from("Finance")],
                negated: true,
            }
        );
        assert_eq!(expr.to_string(), "department NOT IN [\"HR\", \"Finance\"]");
    }

    #[test]
    fn test_bare_field_is_truthiness() {
        assert_eq!(
            compile_predicate("backfill").unwrap(),
            Expression::Truthy("backfill".to_string())
        );
    }

    #[test]
    fn test_negative_and_underscored_numbers() {
        assert_eq!(
            compile_predicate("delta > -1_500.5").unwrap(),
            Expression::Compare {
                field: "delta".to_string(),
                op: Comparison::GreaterThan,
                value: Value::Number(-1500.5),
            }
        );
    }

    #[test]
    fn test_empty_predicate_is_rejected() {
        let err = compile_predicate("   ").unwrap_err();
        assert_eq!(err.position, 0);
    }

    #[test]
    fn test_ordering_needs_numeric_literal() {
        let err = compile_predicate("budget_amount > \"high\"").unwrap_err();
        assert_eq!(err.position, 16);
        assert!(err.message.contains("numeric literal"), "{}", err);
    }

    #[test]
    fn test_trailing_tokens_are_rejected() {
        let err = compile_predicate("a > 1 b").unwrap_err();
        assert_eq!(err.position, 6);
        assert!(err.to_string().ends_with("(at offset 6)"), "{}", err);
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());
    }

    #[test]
    fn test_unterminated_string_is_rejected() {
        let err = compile_predicate("priority == \"urgent").unwrap_err();
        assert_eq!(err.position, 12);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_unexpected_character_is_rejected() {
        let err = compile_predicate("budget_amount > 5 # comment").unwrap_err();
        assert_eq!(err.position, 18);
    }

    #[test]
    fn test_unclosed_parenthesis_is_rejected() {
        assert!(compile_predicate("(a > 1").is_err());
        assert!(compile_predicate("a IN [1, 2").is_err());
    }
}

#[cfg(test)]
mod evaluator_tests {
    use super::*;

    #[test]
    fn test_matching_branch_is_taken_with_reason() {
        let node = condition_node(&[("budget_amount > 50000", "high")], Some("low"));
        let decision = ConditionEvaluator::default()
            .evaluate(&node, &mpr(85000.0, "normal"))
            .unwrap();
        assert_eq!(decision.target, "high");
        assert_eq!(decision.edge, "check:branch0");
        assert_eq!(decision.branch, Some(0));
        assert_eq!(decision.reason, "budget_amount (was 85000) > 50000");
    }

    #[test]
    fn test_default_route_when_nothing_matches() {
        let node = condition_node(&[("budget_amount > 50000", "high")], Some("low"));
        let decision = ConditionEvaluator::default()
            .evaluate(&node, &mpr(30000.0, "normal"))
            .unwrap();
        assert_eq!(decision.target, "low");
        assert_eq!(decision.edge, "check:default");
        assert_eq!(decision.branch, None);
        assert_eq!(decision.reason, "no branch matched, took the default route");
    }

    #[test]
    fn test_boundary_value_is_not_greater() {
        let node = condition_node(&[("budget_amount > 50000", "high")], Some("low"));
        let decision = ConditionEvaluator::default()
            .evaluate(&node, &mpr(50000.0, "normal"))
            .unwrap();
        assert_eq!(decision.target, "low");
    }

    #[test]
    fn test_first_matching_branch_wins() {
        let node = condition_node(
            &[
                ("budget_amount > 100000", "high"),
                ("budget_amount > 50000", "low"),
            ],
            Some("fallback"),
        );
        let evaluator = ConditionEvaluator::default();

        let big = evaluator.evaluate(&node, &mpr(150000.0, "normal")).unwrap();
        assert_eq!((big.branch, big.target.as_str()), (Some(0), "high"));

        let medium = evaluator.evaluate(&node, &mpr(75000.0, "normal")).unwrap();
        assert_eq!((medium.branch, medium.target.as_str()), (Some(1), "low"));
        assert_eq!(medium.edge, "check:branch1");
    }

    #[test]
    fn test_missing_field_falls_through_by_default() {
        let node = condition_node(&[("headcount > 3", "high")], Some("low"));
        let decision = ConditionEvaluator::new(MissingFieldPolicy::FallThrough)
            .evaluate(&node, &mpr(85000.0, "normal"))
            .unwrap();
        assert_eq!(decision.target, "low");
    }

    #[test]
    fn test_missing_field_aborts_under_abort_policy() {
        let node = condition_node(&[("headcount > 3", "high")], Some("low"));
        let err = ConditionEvaluator::new(MissingFieldPolicy::Abort)
            .evaluate(&node, &mpr(85000.0, "normal"))
            .unwrap_err();
        assert_eq!(
            err,
            EvaluationError::MissingField {
                node_id: "check".to_string(),
                field: "headcount".to_string()
            }
        );
    }

    #[test]
    fn test_non_numeric_field_under_ordering_operator() {
        let node = condition_node(&[("budget_amount > 50000", "high")], Some("low"));
        let payload = Payload::new().with("budget_amount", "lots");

        let err = ConditionEvaluator::new(MissingFieldPolicy::Abort)
            .evaluate(&node, &payload)
            .unwrap_err();
        match err {
            EvaluationError::TypeMismatch {
                field,
                operation,
                found,
                ..
            } => {
                assert_eq!(field, "budget_amount");
                assert_eq!(operation, "> 50000");
                assert_eq!(found, Value::from("lots"));
            }
            other => panic!("expected TypeMismatch, got {:?}", other),
        }

        let decision = ConditionEvaluator::default()
            .evaluate(&node, &payload)
            .unwrap();
        assert_eq!(decision.target, "low");
    }

    #[test]
    fn test_numeric_text_compares_as_number() {
        let node = condition_node(&[("budget_amount > 50000", "high")], Some("low"));
        let payload = Payload::new().with("budget_amount", "85000");
        let decision = ConditionEvaluator::default().evaluate(&node, &payload).unwrap();
        assert_eq!(decision.target, "high");
    }

    #[test]
    fn test_unroutable_without_default() {
        let node = condition_node(&[("budget_amount > 50000", "high")], None);
        let err = ConditionEvaluator::default()
            .evaluate(&node, &mpr(100.0, "low"))
            .unwrap_err();
        assert_eq!(
            err,
            EvaluationError::UnroutablePayload {
                node_id: "check".to_string()
            }
        );
    }

    #[test]
    fn test_non_condition_node_is_rejected() {
        let flow = active_template(Template::Simple);
        let err = ConditionEvaluator::default()
            .evaluate(flow.node("start_1").unwrap(), &Payload::new())
            .unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::NotAConditionNode { ref kind, .. } if kind == "start"
        ));
    }

    #[test]
    fn test_or_short_circuits_past_missing_field() {
        let node = condition_node(
            &[("priority == \"urgent\" OR headcount > 3", "high")],
            Some("low"),
        );
        let decision = ConditionEvaluator::new(MissingFieldPolicy::Abort)
            .evaluate(&node, &mpr(1000.0, "urgent"))
            .unwrap();
        assert_eq!(decision.target, "high");
        assert_eq!(decision.reason, "priority (was \"urgent\") == \"urgent\"");
    }

    #[test]
    fn test_missing_left_operand_does_not_sink_the_or() {
        let node = condition_node(
            &[("employment_type == \"contractor\" OR budget_amount < 25000", "high")],
            Some("low"),
        );
        let decision = ConditionEvaluator::default()
            .evaluate(&node, &Payload::new().with("budget_amount", 10000.0))
            .unwrap();
        assert_eq!(decision.target, "high");
        assert_eq!(
            decision.reason,
            "employment_type (missing) OR budget_amount (was 10000) < 25000"
        );

        let err = ConditionEvaluator::new(MissingFieldPolicy::Abort)
            .evaluate(&node, &Payload::new().with("budget_amount", 10000.0))
            .unwrap_err();
        assert!(matches!(err, EvaluationError::MissingField { ref field, .. } if field == "employment_type"));
    }

    #[test]
    fn test_unresolved_leaf_counts_as_false_inside_and_and_not() {
        let node = condition_node(
            &[
                ("headcount > 3 AND budget_amount > 10", "high"),
                ("NOT budget_amount > 10 AND priority == \"normal\"", "low"),
            ],
            Some("fallback"),
        );
        let payload = Payload::new()
            .with("budget_amount", "lots")
            .with("priority", "normal");
        let decision = ConditionEvaluator::default()
            .evaluate(&node, &payload)
            .unwrap();
        assert_eq!((decision.branch, decision.target.as_str()), (Some(1), "low"));
        assert_eq!(
            decision.reason,
            "NOT budget_amount (was \"lots\", not a number) AND priority (was \"normal\") == \"normal\""
        );
    }

    #[test]
    fn test_and_reason_lists_both_sides() {
        let node = condition_node(
            &[("budget_amount > 50000 AND priority == \"urgent\"", "high")],
            Some("low"),
        );
        let decision = ConditionEvaluator::default()
            .evaluate(&node, &mpr(85000.0, "urgent"))
            .unwrap();
        assert_eq!(
            decision.reason,
            "budget_amount (was 85000) > 50000 AND priority (was \"urgent\") == \"urgent\""
        );
    }

    #[test]
    fn test_grouped_reason_keeps_parentheses() {
        let node = condition_node(
            &[("(priority == \"high\" OR priority == \"urgent\") AND budget_amount > 10", "high")],
            Some("low"),
        );
        let decision = ConditionEvaluator::default()
            .evaluate(&node, &mpr(85000.0, "urgent"))
            .unwrap();
        assert_eq!(
            decision.reason,
            "(priority (was \"urgent\") == \"high\" OR priority (was \"urgent\") == \"urgent\") AND budget_amount (was 85000) > 10"
        );
    }

    #[test]
    fn test_membership_against_scalar_and_list_fields() {
        let node = condition_node(&[("tags IN [\"urgent\", \"exec\"]", "high")], Some("low"));
        let evaluator = ConditionEvaluator::default();

        let scalar = Payload::new().with("tags", "exec");
        assert_eq!(evaluator.evaluate(&node, &scalar).unwrap().target, "high");

        let list = Payload::new().with(
            "tags",
            Value::List(vec![Value::from("backfill"), Value::from("urgent")]),
        );
        let decision = evaluator.evaluate(&node, &list).unwrap();
        assert_eq!(decision.target, "high");
        assert_eq!(
            decision.reason,
            "tags (was [\"backfill\", \"urgent\"]) IN [\"urgent\", \"exec\"]"
        );

        let neither = Payload::new().with("tags", Value::List(vec![]));
        assert_eq!(evaluator.evaluate(&node, &neither).unwrap().target, "low");
    }

    #[test]
    fn test_not_and_truthiness() {
        let node = condition_node(&[("NOT backfill", "high")], Some("low"));
        let decision = ConditionEvaluator::default()
            .evaluate(&node, &Payload::new().with("backfill", false))
            .unwrap();
        assert_eq!(decision.target, "high");
        assert_eq!(decision.reason, "NOT backfill (was false)");
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let node = condition_node(
            &[
                ("priority IN [\"urgent\"]", "high"),
                ("budget_amount >= 20000", "low"),
            ],
            Some("fallback"),
        );
        let evaluator = ConditionEvaluator::default();
        let payload = mpr(20000.0, "normal");
        let first = evaluator.evaluate(&node, &payload).unwrap();
        for _ in 0..10 {
            assert_eq!(evaluator.evaluate(&node, &payload).unwrap(), first);
        }
        assert_eq!(first.target, "low");
    }
}

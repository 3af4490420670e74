//! Tests for building flows from specs and validating their structure.
mod common;
use common::*;
use ringi::error::BuildError;
use ringi::flow::parsing::NodeParser;
use ringi::flow::{Edge, EdgeGuard, NotificationConfig, build};
use ringi::prelude::*;
use serde_json::json;

/// Maps an "escalation" node onto a notification to the HR director.
struct EscalationParser;

impl NodeParser for EscalationParser {
    fn kind(&self) -> &str {
        "escalation"
    }

    fn parse(&self, node: &NodeSpec) -> std::result::Result<NodeKind, BuildError> {
        Ok(NodeKind::Notification(NotificationConfig {
            recipients: vec!["hr_director".to_string()],
            subject: format!("Escalated at {}", node.id),
            message: String::new(),
        }))
    }
}

#[cfg(test)]
mod builder_tests {
    use super::*;

    #[test]
    fn test_custom_node_parser() {
        let graph = || {
            FlowBuilder::new("Escalating")
                .node(start("s"))
                .node(NodeSpec::new("x", "escalation", "Escalate"))
                .node(end("e"))
                .edges(vec![edge("s", "x"), edge("x", "e")])
        };

        assert!(matches!(
            graph().build(),
            Err(BuildError::InvalidNodeKind { ref kind_name, .. }) if kind_name == "escalation"
        ));

        let flow = graph()
            .with_custom_parser(Box::new(EscalationParser))
            .build()
            .unwrap();
        match &flow.node("x").unwrap().kind {
            NodeKind::Notification(config) => {
                assert_eq!(config.recipients, vec!["hr_director"]);
                assert_eq!(config.subject, "Escalated at x");
            }
            other => panic!("expected a notification, got {:?}", other),
        }
        assert!(validate(&flow).is_valid());
        assert!(flow.is_editable());
    }

    #[test]
    fn test_every_template_builds_and_validates() {
        for template in Template::ALL {
            let flow = FlowBuilder::from_spec(template.spec("T"))
                .build()
                .unwrap_or_else(|e| panic!("{} failed to build: {}", template, e));
            let report = validate(&flow);
            assert!(report.is_valid(), "{} is invalid: {}", template, report);
            assert_eq!(flow.status, FlowStatus::Draft);
            assert_eq!(flow.version, 1);
        }
    }

    #[test]
    fn test_simple_template_shape() {
        let flow = FlowBuilder::from_spec(Template::Simple.spec("Simple"))
            .build()
            .unwrap();
        assert_eq!(flow.node_count(), 4);
        assert_eq!(flow.edges.len(), 3);
        assert_eq!(
            flow.summary(),
            vec![("start", 1), ("approval", 2), ("end", 1)]
        );
        assert_eq!(flow.start_node().map(|n| n.id.as_str()), Some("start_1"));

        let Some(NodeKind::Approval(config)) = flow.node("approval_2").map(|n| &n.kind) else {
            panic!("approval_2 should be an approval node");
        };
        assert_eq!(config.role, "budget_holder");
        assert_eq!(config.timeout_days, Some(7));
        assert_eq!(config.reminder_days, Some(5));
        assert_eq!(config.escalate_to.as_deref(), Some("budget_sponsor"));
    }

    #[test]
    fn test_condition_routes_become_guarded_edges() {
        let flow = FlowBuilder::from_spec(Template::Conditional.spec("Conditional"))
            .build()
            .unwrap();

        let branch = flow.edge("condition_1:branch0").expect("branch edge");
        assert_eq!(branch.source, "condition_1");
        assert_eq!(branch.target, "approval_1");
        assert_eq!(branch.guard, EdgeGuard::Branch(0));

        let default = flow.edge("condition_1:default").expect("default edge");
        assert_eq!(default.target, "approval_2");
        assert_eq!(default.guard, EdgeGuard::Default);

        let Some(NodeKind::Condition(config)) = flow.node("condition_1").map(|n| &n.kind) else {
            panic!("condition_1 should be a condition node");
        };
        assert_eq!(config.branches.len(), 1);
        assert_eq!(config.branches[0].source, "budget_amount > 50000");
        assert_eq!(
            config.branches[0].expression.to_string(),
            "budget_amount > 50000"
        );
    }

    #[test]
    fn test_generated_edge_ids_name_the_port() {
        let flow = approve_or_reject_flow();
        assert!(flow.edge("start:output->gate").is_some());
        assert!(flow.edge("gate:approve->ok").is_some());
        assert_eq!(
            flow.edge("gate:reject->rejected").map(|e| e.guard),
            Some(EdgeGuard::Reject)
        );
    }

    #[test]
    fn test_label_falls_back_to_id() {
        let flow = build(
            vec![NodeSpec::new("s", "start", ""), end("e")],
            vec![edge("s", "e")],
        )
        .unwrap();
        assert_eq!(flow.node("s").unwrap().label, "s");
        assert_eq!(flow.node("e").unwrap().label, "End");
    }

    #[test]
    fn test_duplicate_node_id_is_rejected() {
        let result = build(vec![start("a"), end("a")], vec![]);
        assert_eq!(
            result.unwrap_err(),
            BuildError::DuplicateNodeId {
                node_id: "a".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_edge_id_is_rejected() {
        let result = build(
            vec![start("s"), notification("n"), end("e")],
            vec![edge("s", "n").with_id("x"), edge("n", "e").with_id("x")],
        );
        assert_eq!(
            result.unwrap_err(),
            BuildError::DuplicateEdgeId {
                edge_id: "x".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result = build(vec![NodeSpec::new("x", "webhook", "Call out")], vec![]);
        assert!(matches!(
            result,
            Err(BuildError::InvalidNodeKind { ref node_id, ref kind_name })
                if node_id == "x" && kind_name == "webhook"
        ));
    }

    #[test]
    fn test_kind_lookup_ignores_case() {
        let flow = build(
            vec![NodeSpec::new("s", "Start", "S"), NodeSpec::new("e", "END", "E")],
            vec![edge("s", "e")],
        )
        .unwrap();
        assert!(validate(&flow).is_valid());
    }

    #[test]
    fn test_kind_alias_maps_onto_builtin_parser() {
        let flow = FlowBuilder::new("Aliased")
            .with_kind_alias("managerSignoff", "approval")
            .node(start("s"))
            .node(
                NodeSpec::new("m", "managerSignoff", "Manager")
                    .with_property("approverType", json!("manager")),
            )
            .node(end("e"))
            .edge(edge("s", "m"))
            .edge(edge("m", "e"))
            .build()
            .unwrap();
        assert_eq!(flow.node("m").unwrap().kind.name(), "approval");
    }

    #[test]
    fn test_approval_requires_a_role() {
        let result = build(vec![NodeSpec::new("a", "approval", "A")], vec![]);
        assert_eq!(
            result.unwrap_err(),
            BuildError::MissingProperty {
                node_id: "a".to_string(),
                property: "approverType".to_string()
            }
        );
    }

    #[test]
    fn test_timeout_days_accepts_numeric_text() {
        let flow = build(
            vec![approval("a", "manager").with_property("timeoutDays", json!("4"))],
            vec![],
        )
        .unwrap();
        let Some(NodeKind::Approval(config)) = flow.node("a").map(|n| &n.kind) else {
            panic!("expected an approval node");
        };
        assert_eq!(config.timeout_days, Some(4));

        let bad = build(
            vec![approval("a", "manager").with_property("timeoutDays", json!(-1))],
            vec![],
        );
        assert!(matches!(bad, Err(BuildError::InvalidProperty { ref property, .. }) if property == "timeoutDays"));
    }

    #[test]
    fn test_notification_recipients_from_string_or_array() {
        let flow = build(
            vec![
                NodeSpec::new("n1", "notification", "N1")
                    .with_property("recipients", json!("creator, manager ,")),
                NodeSpec::new("n2", "notification", "N2")
                    .with_property("recipients", json!(["hr", "recruiter"])),
            ],
            vec![],
        )
        .unwrap();
        let recipients = |id: &str| match &flow.node(id).unwrap().kind {
            NodeKind::Notification(config) => config.recipients.clone(),
            other => panic!("unexpected kind {:?}", other),
        };
        assert_eq!(recipients("n1"), vec!["creator", "manager"]);
        assert_eq!(recipients("n2"), vec!["hr", "recruiter"]);
    }

    #[test]
    fn test_invalid_predicate_reports_position() {
        let result = build(
            vec![condition("c", &[("budget_amount >", "e")], Some("e")), end("e")],
            vec![],
        );
        match result {
            Err(BuildError::InvalidPredicate {
                node_id,
                predicate,
                position,
                ..
            }) => {
                assert_eq!(node_id, "c");
                assert_eq!(predicate, "budget_amount >");
                assert_eq!(position, 15);
            }
            other => panic!("expected InvalidPredicate, got {:?}", other),
        }
    }

    #[test]
    fn test_condition_without_branches_is_rejected() {
        let result = build(vec![NodeSpec::new("c", "condition", "C")], vec![]);
        assert!(matches!(
            result,
            Err(BuildError::MissingProperty { ref property, .. }) if property == "branches"
        ));
    }

    #[test]
    fn test_edge_to_unknown_node_is_rejected() {
        let result = build(vec![start("s")], vec![edge("s", "ghost")]);
        assert!(matches!(
            result,
            Err(BuildError::NodeNotFound { ref missing_node_id, .. }) if missing_node_id == "ghost"
        ));
    }

    #[test]
    fn test_condition_route_to_unknown_node_is_rejected() {
        let result = build(
            vec![condition("c", &[("priority == \"urgent\"", "ghost")], None)],
            vec![],
        );
        assert!(matches!(
            result,
            Err(BuildError::NodeNotFound { ref missing_node_id, ref source_id })
                if missing_node_id == "ghost" && source_id == "c"
        ));
    }

    #[test]
    fn test_explicit_edge_out_of_condition_is_rejected() {
        let result = build(
            vec![condition("c", &[("flag", "e")], Some("e")), end("e")],
            vec![edge("c", "e").with_id("manual")],
        );
        assert_eq!(
            result.unwrap_err(),
            BuildError::ConditionEdge {
                edge_id: "manual".to_string(),
                node_id: "c".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_port_is_rejected() {
        let result = build(
            vec![approval("a", "manager"), end("e")],
            vec![edge("a", "e").with_port("maybe")],
        );
        assert!(matches!(
            result,
            Err(BuildError::InvalidPort { ref port, .. }) if port == "maybe"
        ));
    }

    #[test]
    fn test_spec_from_json_accepts_aliases() {
        let spec = FlowSpec::from_json(ROUTING_FLOW_JSON).unwrap();
        assert_eq!(spec.name, "Urgent Routing");
        assert_eq!(spec.nodes[0].label, "Submitted");
        assert_eq!(spec.edges[0].source, "start");
        assert_eq!(spec.edges[1].port.as_deref(), Some("approve"));

        let flow = FlowBuilder::from_spec(spec).build().unwrap();
        assert_eq!(flow.description, "Urgent requests skip the manager");
        assert!(validate(&flow).is_valid(), "{}", validate(&flow));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        assert!(matches!(
            FlowSpec::from_json("{ \"name\": "),
            Err(BuildError::JsonParseError(_))
        ));
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    fn report_for(nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>) -> ValidationReport {
        validate(&build(nodes, edges).expect("graph should build"))
    }

    #[test]
    fn test_valid_linear_flow() {
        let report = report_for(
            vec![start("s"), approval("a", "manager"), end("e")],
            vec![edge("s", "a"), edge("a", "e")],
        );
        assert!(report.is_valid());
        assert_eq!(report.to_string(), "flow is valid");
    }

    #[test]
    fn test_empty_flow_reports_missing_start_and_end() {
        let report = report_for(vec![], vec![]);
        assert_eq!(
            report.violations,
            vec![Violation::MissingStart, Violation::MissingEnd]
        );
    }

    #[test]
    fn test_multiple_starts() {
        let report = report_for(
            vec![start("s1"), start("s2"), end("e")],
            vec![edge("s1", "e"), edge("s2", "e")],
        );
        assert!(report.contains(|v| matches!(
            v,
            Violation::MultipleStarts { node_ids } if node_ids == &["s1", "s2"]
        )));
    }

    #[test]
    fn test_every_violation_is_reported() {
        // Orphaned approval without outgoing edge, plus a missing end node.
        let report = report_for(
            vec![start("s"), notification("n"), approval("orphan", "manager")],
            vec![edge("s", "n")],
        );
        assert!(report.contains(|v| *v == Violation::MissingEnd));
        assert!(report.contains(|v| matches!(v, Violation::NoOutgoingEdge { node_id } if node_id == "n")));
        assert!(report.contains(|v| matches!(v, Violation::NoOutgoingEdge { node_id } if node_id == "orphan")));
        assert!(report.contains(|v| matches!(v, Violation::NoIncomingEdge { node_id } if node_id == "orphan")));
        assert!(report.contains(|v| matches!(v, Violation::Unreachable { node_id } if node_id == "orphan")));
        assert!(report.violations.len() >= 5);
    }

    #[test]
    fn test_unreachable_node_with_outgoing_edge() {
        let report = report_for(
            vec![start("s"), approval("island", "manager"), end("e")],
            vec![edge("s", "e"), edge("island", "e")],
        );
        assert_eq!(
            report.violations,
            vec![
                Violation::NoIncomingEdge {
                    node_id: "island".to_string()
                },
                Violation::Unreachable {
                    node_id: "island".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_cycle_is_reported_as_closed_path() {
        let report = report_for(
            vec![
                start("s"),
                approval("a1", "manager"),
                approval("a2", "director"),
                end("e"),
            ],
            vec![
                edge("s", "a1"),
                edge("a1", "a2").with_port("approve"),
                edge("a1", "e").with_port("reject"),
                edge("a2", "a1"),
            ],
        );
        assert_eq!(
            report.violations,
            vec![Violation::Cycle {
                path: vec!["a1".to_string(), "a2".to_string(), "a1".to_string()]
            }]
        );
        assert_eq!(
            report.to_string(),
            "flow contains a cycle: a1 -> a2 -> a1"
        );
    }

    #[test]
    fn test_condition_without_default() {
        let report = report_for(
            vec![
                start("s"),
                condition("c", &[("budget_amount > 1", "e")], None),
                end("e"),
            ],
            vec![edge("s", "c")],
        );
        assert_eq!(
            report.violations,
            vec![Violation::MissingDefaultBranch {
                node_id: "c".to_string()
            }]
        );
    }

    #[test]
    fn test_approval_with_only_a_reject_edge() {
        let report = report_for(
            vec![start("s"), approval("a", "manager"), end("e")],
            vec![edge("s", "a"), edge("a", "e").with_port("reject")],
        );
        assert!(report.contains(|v| matches!(v, Violation::MissingApproveEdge { node_id } if node_id == "a")));
    }

    #[test]
    fn test_approval_with_two_approve_edges() {
        let report = report_for(
            vec![start("s"), approval("a", "manager"), end("e1"), end("e2")],
            vec![
                edge("s", "a"),
                edge("a", "e1"),
                edge("a", "e2").with_port("approve"),
            ],
        );
        assert!(report.contains(|v| matches!(
            v,
            Violation::DuplicateApprovalPort { port, .. } if port == "approve"
        )));
    }

    #[test]
    fn test_start_with_two_successors() {
        let report = report_for(
            vec![start("s"), end("e1"), end("e2")],
            vec![edge("s", "e1"), edge("s", "e2")],
        );
        assert!(report.contains(|v| *v
            == Violation::AmbiguousSuccessor {
                node_id: "s".to_string(),
                count: 2
            }));
    }

    #[test]
    fn test_edges_into_start_and_out_of_end() {
        let report = report_for(
            vec![start("s"), notification("n"), end("e")],
            vec![
                edge("s", "n"),
                edge("n", "e"),
                edge("e", "s").with_id("loop-back"),
            ],
        );
        assert!(report.contains(|v| matches!(v, Violation::EdgeIntoStart { edge_id } if edge_id == "loop-back")));
        assert!(report.contains(|v| matches!(v, Violation::EdgeOutOfEnd { edge_id } if edge_id == "loop-back")));
    }

    #[test]
    fn test_guard_not_allowed_on_start() {
        let report = report_for(
            vec![start("s"), end("e")],
            vec![edge("s", "e").with_port("approve")],
        );
        assert!(report.contains(|v| matches!(
            v,
            Violation::GuardNotAllowed { guard, kind, .. } if guard == "approve" && kind == "start"
        )));
    }

    #[test]
    fn test_dangling_edge_and_duplicate_node_after_manual_edit() {
        let mut flow = build(
            vec![start("s"), end("e")],
            vec![edge("s", "e")],
        )
        .unwrap();
        flow.edges.push(Edge {
            id: "dangling".to_string(),
            source: "e".to_string(),
            target: "ghost".to_string(),
            guard: EdgeGuard::Always,
        });
        flow.nodes.push(flow.nodes[1].clone());

        let report = validate(&flow);
        assert!(report.contains(|v| matches!(v, Violation::DuplicateNodeId { node_id } if node_id == "e")));
        assert!(report.contains(|v| matches!(
            v,
            Violation::DanglingEdge { edge_id, node_id } if edge_id == "dangling" && node_id == "ghost"
        )));
    }

    #[test]
    fn test_condition_route_without_matching_edge() {
        let mut flow = FlowBuilder::from_spec(Template::Conditional.spec("C"))
            .build()
            .unwrap();
        flow.edges.retain(|e| e.id != "condition_1:default");

        let report = validate(&flow);
        assert!(report.contains(|v| matches!(
            v,
            Violation::RouteMismatch { node_id, edge_id }
                if node_id == "condition_1" && edge_id == "condition_1:default"
        )));
    }
}

//! Common test utilities for building flows, payloads and registries.
use ringi::prelude::*;
use serde_json::json;
use std::sync::Arc;

/// Builds a template flow and marks it active, for driving the engine directly.
#[allow(dead_code)]
pub fn active_template(template: Template) -> Flow {
    let mut flow = FlowBuilder::from_spec(template.spec("MPR Approval"))
        .build()
        .expect("template should build");
    flow.status = FlowStatus::Active;
    flow
}

/// A registry holding one activated flow created from `template`.
#[allow(dead_code)]
pub fn registry_with(template: Template) -> (FlowRegistry, Arc<Flow>) {
    registry_with_config(template, EngineConfig::default())
}

#[allow(dead_code)]
pub fn registry_with_config(template: Template, config: EngineConfig) -> (FlowRegistry, Arc<Flow>) {
    let registry = FlowRegistry::new(config);
    let draft = registry
        .create_from_template(template, "MPR Approval", "admin")
        .expect("template should register");
    let flow = registry
        .activate(draft.id, "admin")
        .expect("template should activate");
    (registry, flow)
}

/// An MPR payload with the two fields the templates route on.
#[allow(dead_code)]
pub fn mpr(budget: f64, priority: &str) -> Payload {
    Payload::new()
        .with("position_title", "Backend Engineer")
        .with("department", "Engineering")
        .with("employment_type", "permanent")
        .with("budget_amount", budget)
        .with("priority", priority)
}

#[allow(dead_code)]
pub fn start(id: &str) -> NodeSpec {
    NodeSpec::new(id, "start", "Start")
}

#[allow(dead_code)]
pub fn approval(id: &str, role: &str) -> NodeSpec {
    NodeSpec::new(id, "approval", "Approval").with_property("approverType", json!(role))
}

#[allow(dead_code)]
pub fn notification(id: &str) -> NodeSpec {
    NodeSpec::new(id, "notification", "Notify").with_property("recipients", json!("creator"))
}

#[allow(dead_code)]
pub fn end(id: &str) -> NodeSpec {
    NodeSpec::new(id, "end", "End")
}

#[allow(dead_code)]
pub fn end_with_status(id: &str, status: &str) -> NodeSpec {
    end(id).with_property("finalStatus", json!(status))
}

/// A condition node with one branch per `(predicate, target)` pair.
#[allow(dead_code)]
pub fn condition(id: &str, branches: &[(&str, &str)], default: Option<&str>) -> NodeSpec {
    let branches: Vec<_> = branches
        .iter()
        .map(|(when, target)| json!({ "when": when, "target": target }))
        .collect();
    let node = NodeSpec::new(id, "condition", "Check").with_property("branches", json!(branches));
    match default {
        Some(target) => node.with_property("default", json!(target)),
        None => node,
    }
}

#[allow(dead_code)]
pub fn edge(source: &str, target: &str) -> EdgeSpec {
    EdgeSpec::new(source, target)
}

/// start -> gate (approve -> ok, reject -> rejected)
#[allow(dead_code)]
pub fn approve_or_reject_flow() -> Flow {
    let mut flow = ringi::flow::build(
        vec![
            start("start"),
            approval("gate", "manager"),
            end_with_status("ok", "approved"),
            end_with_status("rejected", "rejected"),
        ],
        vec![
            edge("start", "gate"),
            edge("gate", "ok").with_port("approve"),
            edge("gate", "rejected").with_port("reject"),
        ],
    )
    .expect("flow should build");
    flow.status = FlowStatus::Active;
    flow
}

/// The JSON form of a small routing flow, using the legacy field aliases.
#[allow(dead_code)]
pub const ROUTING_FLOW_JSON: &str = r#"
{
    "name": "Urgent Routing",
    "description": "Urgent requests skip the manager",
    "nodes": [
        { "id": "start", "kind": "start", "name": "Submitted" },
        {
            "id": "route",
            "kind": "condition",
            "name": "Urgency",
            "properties": {
                "branches": [
                    { "when": "priority IN [\"urgent\", \"high\"]", "target": "director" }
                ],
                "default": "manager"
            }
        },
        { "id": "director", "kind": "approval", "properties": { "approverType": "director", "timeoutDays": 2 } },
        { "id": "manager", "kind": "approval", "properties": { "role": "manager" } },
        { "id": "done", "kind": "end", "properties": { "finalStatus": "approved" } }
    ],
    "edges": [
        { "start_node_id": "start", "end_node_id": "route" },
        { "source": "director", "target": "done", "connection_type": "approve" },
        { "source": "manager", "target": "done" }
    ]
}
"#;

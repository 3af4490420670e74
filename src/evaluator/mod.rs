use crate::data::Payload;
use crate::error::EvaluationError;
use crate::flow::{EdgeId, Node, NodeId, NodeKind};
use crate::trace::TraceFormatter;
use serde::{Deserialize, Serialize};
use tracing::debug;

mod engine;

use engine::PredicateEngine;

/// What happens when a predicate reads a field the payload does not carry,
/// or compares a non-numeric value with an ordering operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    /// The predicate counts as false and evaluation moves on to the next branch.
    #[default]
    FallThrough,
    /// The error propagates and fails the execution.
    Abort,
}

/// The route a condition node selected for a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub edge: EdgeId,
    pub target: NodeId,
    /// Index of the matched branch; `None` when the default route was taken.
    pub branch: Option<usize>,
    /// A human-readable explanation of why this route was chosen.
    pub reason: String,
}

/// Evaluates condition nodes against request payloads.
///
/// Evaluation is pure: the payload is only read and the same node and
/// payload always select the same route.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator {
    policy: MissingFieldPolicy,
}

impl ConditionEvaluator {
    pub fn new(policy: MissingFieldPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MissingFieldPolicy {
        self.policy
    }

    /// Selects the route of a condition node.
    ///
    /// Branches are tried in declared order and the first predicate that holds
    /// wins. When none holds the default route is taken. A node with neither a
    /// match nor a default yields [`EvaluationError::UnroutablePayload`].
    pub fn evaluate(
        &self,
        node: &Node,
        payload: &Payload,
    ) -> Result<RouteDecision, EvaluationError> {
        let NodeKind::Condition(config) = &node.kind else {
            return Err(EvaluationError::NotAConditionNode {
                node_id: node.id.clone(),
                kind: node.kind.name().to_string(),
            });
        };

        let engine = PredicateEngine::new(&node.id, payload, self.policy);
        for (index, branch) in config.branches.iter().enumerate() {
            let trace = engine.evaluate(&branch.expression)?;
            if trace.get_outcome() {
                let reason = TraceFormatter::format_trace(&trace);
                debug!(node = %node.id, branch = index, %reason, "condition branch matched");
                return Ok(RouteDecision {
                    edge: branch.route.edge.clone(),
                    target: branch.route.target.clone(),
                    branch: Some(index),
                    reason,
                });
            }
        }

        match &config.default {
            Some(route) => Ok(RouteDecision {
                edge: route.edge.clone(),
                target: route.target.clone(),
                branch: None,
                reason: "no branch matched, took the default route".to_string(),
            }),
            None => Err(EvaluationError::UnroutablePayload {
                node_id: node.id.clone(),
            }),
        }
    }
}

use super::model::{
    Decision, DecisionRecord, Execution, ExecutionStatus, Failure, FailureKind, Step, StepOutcome,
    Verdict,
};
use crate::config::EngineConfig;
use crate::data::Payload;
use crate::error::{EvaluationError, ExecutionError};
use crate::evaluator::ConditionEvaluator;
use crate::flow::{Edge, EdgeGuard, Flow, FlowStatus, Node, NodeId, NodeKind};
use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Drives executions through a flow graph.
///
/// The engine holds no execution state of its own. Every call takes the flow
/// version an execution is bound to and the execution itself, and advances it
/// until it completes, fails, or suspends on an approval node.
#[derive(Debug, Clone, Default)]
pub struct ExecutionEngine {
    evaluator: ConditionEvaluator,
}

impl ExecutionEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            evaluator: ConditionEvaluator::new(config.missing_field),
        }
    }

    /// Creates a Running execution bound to `flow` without entering any node.
    pub fn begin(&self, flow: &Flow, payload: Payload) -> Result<Execution, ExecutionError> {
        if flow.status != FlowStatus::Active {
            return Err(ExecutionError::FlowNotActive {
                flow_id: flow.id,
                status: flow.status,
            });
        }
        Ok(Execution {
            id: Uuid::new_v4(),
            flow: flow.flow_ref(),
            payload,
            status: ExecutionStatus::Running,
            steps: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            failure: None,
        })
    }

    /// Advances a Running execution from wherever its trace left off.
    pub fn run(&self, flow: &Flow, execution: &mut Execution) -> Result<(), ExecutionError> {
        self.check_flow(flow, execution)?;
        if execution.status != ExecutionStatus::Running {
            return Err(ExecutionError::InvalidState {
                execution_id: execution.id,
                expected: ExecutionStatus::Running,
                found: execution.status,
            });
        }

        let entry = match execution.steps.last().and_then(|s| s.outcome.edge()) {
            Some(edge_id) => flow.edge(edge_id).map(|e| e.target.clone()),
            None => flow.start_node().map(|n| n.id.clone()),
        };
        let Some(entry) = entry else {
            return Err(self.fail_broken(
                execution,
                None,
                "flow has no start node or the last recorded edge is missing",
            ));
        };
        self.drive(flow, execution, entry)
    }

    /// Begins and runs an execution in one call.
    pub fn start(&self, flow: &Flow, payload: Payload) -> Result<Execution, ExecutionError> {
        let mut execution = self.begin(flow, payload)?;
        self.run(flow, &mut execution)?;
        Ok(execution)
    }

    /// Dry-runs `flow` over `payload`, approving every approval step as `actor`.
    ///
    /// Works on flows in any status, so drafts can be tried before activation.
    /// Failures are recorded on the returned execution rather than returned.
    pub fn simulate(&self, flow: &Flow, payload: Payload, actor: &str) -> Execution {
        let mut execution = Execution {
            id: Uuid::new_v4(),
            flow: flow.flow_ref(),
            payload,
            status: ExecutionStatus::Running,
            steps: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            failure: None,
        };
        let mut result = self.run(flow, &mut execution);
        while result.is_ok() && execution.status == ExecutionStatus::WaitingForApproval {
            result = self.resume(flow, &mut execution, Decision::approve(actor));
        }
        if let Err(e) = result {
            debug!(execution = %execution.id, error = %e, "simulation stopped");
        }
        execution
    }

    /// Answers the approval step an execution is suspended on and continues it.
    ///
    /// A rejection with no reject edge is a normal outcome: the execution ends
    /// as Failed with [`FailureKind::Rejected`] and `Ok(())` is returned.
    pub fn resume(
        &self,
        flow: &Flow,
        execution: &mut Execution,
        decision: Decision,
    ) -> Result<(), ExecutionError> {
        if execution.status != ExecutionStatus::WaitingForApproval {
            return Err(ExecutionError::InvalidState {
                execution_id: execution.id,
                expected: ExecutionStatus::WaitingForApproval,
                found: execution.status,
            });
        }
        self.check_flow(flow, execution)?;

        let Some(node_id) = execution.current_node().map(String::from) else {
            return Err(self.fail_broken(execution, None, "waiting execution has no steps"));
        };
        let Some(node) = flow.node(&node_id) else {
            return Err(self.fail_broken(
                execution,
                Some(&node_id),
                "node is not part of the bound flow",
            ));
        };

        let edge = match decision.verdict {
            Verdict::Approve => approve_edge(flow, node),
            Verdict::Reject => flow
                .outgoing(&node.id)
                .find(|e| e.guard == EdgeGuard::Reject),
        };
        if edge.is_none() && decision.verdict == Verdict::Approve {
            return Err(self.fail_broken(execution, Some(&node_id), "approval node has no approve edge"));
        }

        let record = DecisionRecord {
            verdict: decision.verdict,
            actor: decision.actor.clone(),
            comment: decision.comment.clone(),
            decided_at: Utc::now(),
            edge: edge.map(|e| e.id.clone()),
        };
        let undecided = matches!(
            execution.steps.last().map(|s| &s.outcome),
            Some(StepOutcome::Approval { decision: None, .. })
        );
        if !undecided {
            return Err(self.fail_broken(
                execution,
                Some(&node_id),
                "last step is not an undecided approval",
            ));
        }
        if let Some(StepOutcome::Approval { decision: slot, .. }) =
            execution.steps.last_mut().map(|s| &mut s.outcome)
        {
            *slot = Some(record);
        }

        let Some(edge) = edge else {
            warn!(
                execution = %execution.id,
                node = %node_id,
                actor = %decision.actor,
                "execution rejected"
            );
            fail(
                execution,
                FailureKind::Rejected,
                Some(node_id),
                format!("rejected by {}", decision.actor),
            );
            return Ok(());
        };

        info!(
            execution = %execution.id,
            node = %node_id,
            actor = %decision.actor,
            verdict = %decision.verdict,
            "approval decided"
        );
        execution.status = ExecutionStatus::Running;
        self.drive(flow, execution, edge.target.clone())
    }

    /// Ends a suspended execution without a decision.
    pub fn abandon(
        &self,
        execution: &mut Execution,
        actor: &str,
        reason: &str,
    ) -> Result<(), ExecutionError> {
        if execution.status != ExecutionStatus::WaitingForApproval {
            return Err(ExecutionError::InvalidState {
                execution_id: execution.id,
                expected: ExecutionStatus::WaitingForApproval,
                found: execution.status,
            });
        }
        let node = execution.current_node().map(String::from);
        warn!(execution = %execution.id, actor, reason, "execution abandoned");
        fail(
            execution,
            FailureKind::Abandoned,
            node,
            format!("abandoned by {}: {}", actor, reason),
        );
        Ok(())
    }

    fn check_flow(&self, flow: &Flow, execution: &Execution) -> Result<(), ExecutionError> {
        if execution.flow != flow.flow_ref() {
            return Err(ExecutionError::FlowMismatch {
                execution_id: execution.id,
                expected: execution.flow,
                found: flow.flow_ref(),
            });
        }
        Ok(())
    }

    /// Enters nodes starting at `current` until the execution suspends or ends.
    fn drive(
        &self,
        flow: &Flow,
        execution: &mut Execution,
        mut current: NodeId,
    ) -> Result<(), ExecutionError> {
        let limit = flow.node_count();
        loop {
            if execution.steps.len() >= limit {
                error!(
                    execution = %execution.id,
                    flow = %flow.flow_ref(),
                    node = %current,
                    limit,
                    "cycle guard tripped; the flow graph is not acyclic"
                );
                let err = ExecutionError::CycleDetected {
                    execution_id: execution.id,
                    node_id: current.clone(),
                    limit,
                };
                fail(execution, FailureKind::CycleDetected, Some(current), err.to_string());
                return Err(err);
            }

            let Some(node) = flow.node(&current) else {
                return Err(self.fail_broken(
                    execution,
                    Some(&current),
                    "edge leads to a node that does not exist",
                ));
            };
            debug!(
                execution = %execution.id,
                node = %node.id,
                kind = node.kind.name(),
                "entering node"
            );

            let outcome = match &node.kind {
                NodeKind::Start => {
                    let edge = self.single_successor(flow, node, execution)?;
                    current = edge.target.clone();
                    StepOutcome::Started {
                        edge: edge.id.clone(),
                    }
                }
                NodeKind::Notification(config) => {
                    let edge = self.single_successor(flow, node, execution)?;
                    info!(
                        execution = %execution.id,
                        node = %node.id,
                        recipients = %config.recipients.join(","),
                        subject = %config.subject,
                        "notification sent"
                    );
                    current = edge.target.clone();
                    StepOutcome::Notified {
                        edge: edge.id.clone(),
                        recipients: config.recipients.clone(),
                    }
                }
                NodeKind::Condition(_) => {
                    let decision = match self.evaluator.evaluate(node, &execution.payload) {
                        Ok(decision) => decision,
                        Err(e) => {
                            fail(
                                execution,
                                failure_kind(&e),
                                Some(node.id.clone()),
                                e.to_string(),
                            );
                            return Err(e.into());
                        }
                    };
                    if flow.edge(&decision.edge).is_none() {
                        return Err(self.fail_broken(
                            execution,
                            Some(&node.id),
                            "selected route has no matching edge",
                        ));
                    }
                    current = decision.target;
                    StepOutcome::Routed {
                        edge: decision.edge,
                        branch: decision.branch,
                        reason: decision.reason,
                    }
                }
                NodeKind::Approval(config) => {
                    push_step(execution, node, StepOutcome::Approval {
                        role: config.role.clone(),
                        decision: None,
                    });
                    execution.status = ExecutionStatus::WaitingForApproval;
                    info!(
                        execution = %execution.id,
                        node = %node.id,
                        role = %config.role,
                        "waiting for approval"
                    );
                    return Ok(());
                }
                NodeKind::End(config) => {
                    push_step(execution, node, StepOutcome::Finished {
                        final_status: config.final_status.clone(),
                    });
                    execution.status = ExecutionStatus::Completed;
                    execution.ended_at = Some(Utc::now());
                    info!(execution = %execution.id, node = %node.id, "execution completed");
                    return Ok(());
                }
            };
            push_step(execution, node, outcome);
        }
    }

    fn single_successor<'f>(
        &self,
        flow: &'f Flow,
        node: &Node,
        execution: &mut Execution,
    ) -> Result<&'f Edge, ExecutionError> {
        match flow
            .edges
            .iter()
            .find(|e| e.source == node.id && e.guard == EdgeGuard::Always)
        {
            Some(edge) => Ok(edge),
            None => Err(self.fail_broken(execution, Some(&node.id), "node has no outgoing edge")),
        }
    }

    fn fail_broken(
        &self,
        execution: &mut Execution,
        node_id: Option<&str>,
        message: &str,
    ) -> ExecutionError {
        let node = node_id.unwrap_or("<none>").to_string();
        fail(
            execution,
            FailureKind::BrokenGraph,
            node_id.map(String::from),
            message.to_string(),
        );
        ExecutionError::BrokenGraph {
            node_id: node,
            message: message.to_string(),
        }
    }
}

fn approve_edge<'f>(flow: &'f Flow, node: &Node) -> Option<&'f Edge> {
    let outgoing = || flow.edges.iter().filter(|e| e.source == node.id);
    outgoing()
        .find(|e| e.guard == EdgeGuard::Approve)
        .or_else(|| outgoing().find(|e| e.guard == EdgeGuard::Always))
}

fn push_step(execution: &mut Execution, node: &Node, outcome: StepOutcome) {
    let sequence = execution.steps.len() + 1;
    execution.steps.push(Step {
        sequence,
        node: node.id.clone(),
        kind_name: node.kind.name().to_string(),
        entered_at: Utc::now(),
        outcome,
    });
}

fn fail(execution: &mut Execution, kind: FailureKind, node: Option<NodeId>, message: String) {
    execution.status = ExecutionStatus::Failed;
    execution.ended_at = Some(Utc::now());
    execution.failure = Some(Failure {
        kind,
        node,
        message,
    });
}

fn failure_kind(error: &EvaluationError) -> FailureKind {
    match error {
        EvaluationError::MissingField { .. } => FailureKind::MissingField,
        EvaluationError::TypeMismatch { .. } => FailureKind::TypeMismatch,
        EvaluationError::UnroutablePayload { .. } => FailureKind::UnroutablePayload,
        EvaluationError::NotAConditionNode { .. } => FailureKind::BrokenGraph,
    }
}

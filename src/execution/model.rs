use crate::data::Payload;
use crate::flow::{EdgeId, FlowRef, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type ExecutionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Running,
    WaitingForApproval,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::WaitingForApproval => "waiting_for_approval",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "running" => Ok(ExecutionStatus::Running),
            "waiting" | "waiting_for_approval" => Ok(ExecutionStatus::WaitingForApproval),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("unknown execution status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Approve,
    Reject,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Approve => write!(f, "approve"),
            Verdict::Reject => write!(f, "reject"),
        }
    }
}

/// An approver's answer to a suspended approval step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    pub actor: String,
    pub comment: Option<String>,
}

impl Decision {
    pub fn approve(actor: &str) -> Self {
        Self {
            verdict: Verdict::Approve,
            actor: actor.to_string(),
            comment: None,
        }
    }

    pub fn reject(actor: &str) -> Self {
        Self {
            verdict: Verdict::Reject,
            actor: actor.to_string(),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// A decision as written into the approval step it answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub verdict: Verdict,
    pub actor: String,
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
    /// The edge taken afterwards; `None` for a rejection with no reject edge.
    pub edge: Option<EdgeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    Started {
        edge: EdgeId,
    },
    Notified {
        edge: EdgeId,
        recipients: Vec<String>,
    },
    Routed {
        edge: EdgeId,
        branch: Option<usize>,
        reason: String,
    },
    Approval {
        role: String,
        decision: Option<DecisionRecord>,
    },
    Finished {
        final_status: Option<String>,
    },
}

impl StepOutcome {
    /// The edge this step left its node through, if it has left it.
    pub fn edge(&self) -> Option<&str> {
        match self {
            StepOutcome::Started { edge }
            | StepOutcome::Notified { edge, .. }
            | StepOutcome::Routed { edge, .. } => Some(edge),
            StepOutcome::Approval { decision, .. } => {
                decision.as_ref().and_then(|d| d.edge.as_deref())
            }
            StepOutcome::Finished { .. } => None,
        }
    }
}

/// One node visit in an execution's trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub sequence: usize,
    pub node: NodeId,
    pub kind_name: String,
    pub entered_at: DateTime<Utc>,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    UnroutablePayload,
    MissingField,
    TypeMismatch,
    CycleDetected,
    BrokenGraph,
    Rejected,
    Abandoned,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::UnroutablePayload => "unroutable payload",
            FailureKind::MissingField => "missing field",
            FailureKind::TypeMismatch => "type mismatch",
            FailureKind::CycleDetected => "cycle detected",
            FailureKind::BrokenGraph => "broken graph",
            FailureKind::Rejected => "rejected",
            FailureKind::Abandoned => "abandoned",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub node: Option<NodeId>,
    pub message: String,
}

/// A suspended approval waiting on a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    pub execution: ExecutionId,
    pub flow: FlowRef,
    pub node: NodeId,
    pub role: String,
    pub waiting_since: DateTime<Utc>,
}

/// One run of one flow version over one payload.
///
/// The step trace is append-only: the only in-place write is the decision slot
/// of the approval step the execution is suspended on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub flow: FlowRef,
    pub payload: Payload,
    pub status: ExecutionStatus,
    pub steps: Vec<Step>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub failure: Option<Failure>,
}

impl Execution {
    /// The node of the most recent step.
    pub fn current_node(&self) -> Option<&str> {
        self.steps.last().map(|s| s.node.as_str())
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    pub fn pending_approval(&self) -> Option<PendingApproval> {
        if self.status != ExecutionStatus::WaitingForApproval {
            return None;
        }
        let step = self.steps.last()?;
        match &step.outcome {
            StepOutcome::Approval {
                role,
                decision: None,
            } => Some(PendingApproval {
                execution: self.id,
                flow: self.flow,
                node: step.node.clone(),
                role: role.clone(),
                waiting_since: step.entered_at,
            }),
            _ => None,
        }
    }

    /// Wall-clock time from start to end, for finished executions.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }

    /// Node ids in visit order.
    pub fn path(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.node.as_str()).collect()
    }
}

use crate::ast::Expression;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type FlowId = Uuid;
pub type NodeId = String;
pub type EdgeId = String;

/// Lifecycle state of a flow version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlowStatus {
    Draft,
    Active,
    Inactive,
    Archived,
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowStatus::Draft => "draft",
            FlowStatus::Active => "active",
            FlowStatus::Inactive => "inactive",
            FlowStatus::Archived => "archived",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for FlowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(FlowStatus::Draft),
            "active" => Ok(FlowStatus::Active),
            "inactive" => Ok(FlowStatus::Inactive),
            "archived" => Ok(FlowStatus::Archived),
            other => Err(format!("unknown flow status '{}'", other)),
        }
    }
}

/// A non-owning reference to one flow version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowRef {
    pub id: FlowId,
    pub version: u32,
}

impl fmt::Display for FlowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.id, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalConfig {
    pub role: String,
    pub timeout_days: Option<u32>,
    pub reminder_days: Option<u32>,
    pub escalate_to: Option<String>,
}

/// An outgoing route of a condition node: the edge to take and where it leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub edge: EdgeId,
    pub target: NodeId,
}

/// One predicate of a condition node, kept with its original text for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub source: String,
    pub expression: Expression,
    pub route: Route,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub branches: Vec<Branch>,
    pub default: Option<Route>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub recipients: Vec<String>,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndConfig {
    pub final_status: Option<String>,
}

/// The closed set of node kinds. Each variant carries only its own configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Start,
    Approval(ApprovalConfig),
    Condition(ConditionConfig),
    Notification(NotificationConfig),
    End(EndConfig),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Approval(_) => "approval",
            NodeKind::Condition(_) => "condition",
            NodeKind::Notification(_) => "notification",
            NodeKind::End(_) => "end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
}

/// What has to hold for an edge to be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeGuard {
    /// Unconditional successor. For approval nodes this is also the approve edge.
    Always,
    Approve,
    Reject,
    /// Taken when the condition node's predicate at this index matches first.
    Branch(usize),
    Default,
}

impl fmt::Display for EdgeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeGuard::Always => write!(f, "output"),
            EdgeGuard::Approve => write!(f, "approve"),
            EdgeGuard::Reject => write!(f, "reject"),
            EdgeGuard::Branch(i) => write!(f, "branch {}", i),
            EdgeGuard::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub guard: EdgeGuard,
}

/// A named, versioned approval graph.
///
/// A flow exclusively owns its nodes and edges. The registry stores flows
/// behind `Arc` and only a Draft flow's graph may ever be replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: FlowId,
    pub name: String,
    pub description: String,
    pub version: u32,
    pub status: FlowStatus,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub activated_by: Option<String>,
    pub retired_at: Option<DateTime<Utc>>,
    pub retired_by: Option<String>,
}

impl Flow {
    pub fn flow_ref(&self) -> FlowRef {
        FlowRef {
            id: self.id,
            version: self.version,
        }
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    pub fn edge(&self, edge_id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == edge_id)
    }

    /// The first start node in declaration order.
    pub fn start_node(&self) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| matches!(n.kind, NodeKind::Start))
    }

    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_editable(&self) -> bool {
        self.status == FlowStatus::Draft
    }

    /// Node counts per kind, in first-seen order, e.g. `[("start", 1), ("approval", 2)]`.
    pub fn summary(&self) -> Vec<(&'static str, usize)> {
        let counts = self.nodes.iter().map(|n| n.kind.name()).counts();
        self.nodes
            .iter()
            .map(|n| n.kind.name())
            .unique()
            .map(|name| (name, counts[name]))
            .collect()
    }
}

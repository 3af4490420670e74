use crate::ast::Value;
use crate::execution::{ExecutionId, ExecutionStatus};
use crate::flow::{FlowId, FlowRef, FlowStatus};
use itertools::Itertools;
use thiserror::Error;

/// Errors raised while turning node/edge specifications into a Draft flow.
///
/// Every variant is a malformed-spec error: the input itself is wrong and
/// retrying the same input will fail the same way.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Failed to parse flow spec JSON: {0}")]
    JsonParseError(String),

    #[error("Node id '{node_id}' is declared more than once")]
    DuplicateNodeId { node_id: String },

    #[error("Edge id '{edge_id}' is declared more than once")]
    DuplicateEdgeId { edge_id: String },

    #[error("Node '{node_id}' has an unregistered or invalid kind: '{kind_name}'")]
    InvalidNodeKind { node_id: String, kind_name: String },

    #[error(
        "Node '{missing_node_id}' not found, which is required by '{source_id}'"
    )]
    NodeNotFound {
        missing_node_id: String,
        source_id: String,
    },

    #[error("Node '{node_id}' is missing required property '{property}'")]
    MissingProperty { node_id: String, property: String },

    #[error("Node '{node_id}' has an invalid '{property}' property: {message}")]
    InvalidProperty {
        node_id: String,
        property: String,
        message: String,
    },

    #[error("Node '{node_id}' has an invalid predicate '{predicate}' at offset {position}: {message}")]
    InvalidPredicate {
        node_id: String,
        predicate: String,
        position: usize,
        message: String,
    },

    #[error("Edge '{edge_id}' uses unknown port '{port}'")]
    InvalidPort { edge_id: String, port: String },

    #[error(
        "Edge '{edge_id}' leaves condition node '{node_id}'; condition routes are declared on the node"
    )]
    ConditionEdge { edge_id: String, node_id: String },
}

/// A single structural defect found by flow validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("flow has no start node")]
    MissingStart,

    #[error("flow has more than one start node: {}", .node_ids.join(", "))]
    MultipleStarts { node_ids: Vec<String> },

    #[error("flow has no end node")]
    MissingEnd,

    #[error("node id '{node_id}' appears more than once")]
    DuplicateNodeId { node_id: String },

    #[error("edge id '{edge_id}' appears more than once")]
    DuplicateEdgeId { edge_id: String },

    #[error("edge '{edge_id}' references unknown node '{node_id}'")]
    DanglingEdge { edge_id: String, node_id: String },

    #[error("node '{node_id}' has no outgoing edge")]
    NoOutgoingEdge { node_id: String },

    #[error("node '{node_id}' has no incoming edge")]
    NoIncomingEdge { node_id: String },

    #[error("edge '{edge_id}' points into the start node")]
    EdgeIntoStart { edge_id: String },

    #[error("edge '{edge_id}' leaves an end node")]
    EdgeOutOfEnd { edge_id: String },

    #[error("node '{node_id}' is not reachable from the start node")]
    Unreachable { node_id: String },

    #[error("flow contains a cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("condition node '{node_id}' has no default branch")]
    MissingDefaultBranch { node_id: String },

    #[error("node '{node_id}' must have exactly one outgoing edge, found {count}")]
    AmbiguousSuccessor { node_id: String, count: usize },

    #[error("approval node '{node_id}' has no approve edge")]
    MissingApproveEdge { node_id: String },

    #[error("approval node '{node_id}' has more than one {port} edge")]
    DuplicateApprovalPort { node_id: String, port: String },

    #[error("edge '{edge_id}' carries a '{guard}' guard, which a {kind} node cannot use")]
    GuardNotAllowed {
        edge_id: String,
        guard: String,
        kind: String,
    },

    #[error("condition node '{node_id}' routes through edge '{edge_id}', which does not match the graph")]
    RouteMismatch { node_id: String, edge_id: String },
}

/// Errors that can occur while evaluating a condition node against a payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Field '{field}' referenced by condition node '{node_id}' is not present in the payload")]
    MissingField { node_id: String, field: String },

    #[error(
        "Type mismatch in condition node '{node_id}' during '{field} {operation}': expected {expected}, but found value '{found}'"
    )]
    TypeMismatch {
        node_id: String,
        field: String,
        operation: String,
        expected: String,
        found: Value,
    },

    #[error("Condition node '{node_id}' matched no predicate and has no default branch")]
    UnroutablePayload { node_id: String },

    #[error("Node '{node_id}' is a {kind} node, not a condition node")]
    NotAConditionNode { node_id: String, kind: String },
}

/// Errors raised by the execution engine while starting or advancing a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Flow {flow_id} is {status}; executions can only start against an active flow")]
    FlowNotActive { flow_id: FlowId, status: FlowStatus },

    #[error("Execution {execution_id} is bound to {expected}, but was driven with {found}")]
    FlowMismatch {
        execution_id: ExecutionId,
        expected: FlowRef,
        found: FlowRef,
    },

    #[error("Execution {execution_id} is {found}, expected {expected}")]
    InvalidState {
        execution_id: ExecutionId,
        expected: ExecutionStatus,
        found: ExecutionStatus,
    },

    #[error(
        "Execution {execution_id} exceeded {limit} visited nodes at '{node_id}'; the bound flow contains a cycle"
    )]
    CycleDetected {
        execution_id: ExecutionId,
        node_id: String,
        limit: usize,
    },

    #[error("Flow graph is broken at node '{node_id}': {message}")]
    BrokenGraph { node_id: String, message: String },

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Errors returned by the flow registry and lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Flow {0} not found")]
    FlowNotFound(FlowId),

    #[error("Execution {0} not found")]
    ExecutionNotFound(ExecutionId),

    #[error("No flow is currently active")]
    NoActiveFlow,

    #[error(
        "Flow {flow_id} failed validation with {} violation(s): {}",
        .violations.len(),
        .violations.iter().join("; ")
    )]
    ValidationFailed {
        flow_id: FlowId,
        violations: Vec<Violation>,
    },

    #[error("Flow {flow_id} cannot move from {from} to {to}")]
    InvalidTransition {
        flow_id: FlowId,
        from: FlowStatus,
        to: FlowStatus,
    },

    #[error("Flow {flow_id} is {status}; only draft flows can be changed")]
    NotDraft { flow_id: FlowId, status: FlowStatus },

    /// The execution started but failed while running; it is stored with its trace.
    #[error("Execution {execution_id} failed: {source}")]
    RunFailed {
        execution_id: ExecutionId,
        source: ExecutionError,
    },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Errors that can occur while saving or loading registry snapshots.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("I/O error on '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Serialization failed: {0}")]
    Encode(String),

    #[error("Deserialization failed: {0}")]
    Decode(String),

    #[error("Snapshot is inconsistent: {0}")]
    Corrupt(String),
}

/// Errors that can occur while loading engine configuration.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Could not read config file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Invalid config: {0}")]
    Parse(String),
}

/// Errors that can occur when converting external data into a request payload.
#[derive(Error, Debug, Clone)]
pub enum PayloadError {
    #[error("Failed to parse payload JSON: {0}")]
    JsonParseError(String),

    #[error("Payload must be a JSON object of field names to values")]
    NotAnObject,

    #[error("Field '{0}' holds a nested object, which payloads do not support")]
    UnsupportedValue(String),

    #[error("Could not read payload file '{path}': {message}")]
    Io { path: String, message: String },
}

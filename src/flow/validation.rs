use super::model::{EdgeGuard, Flow, NodeKind};
use crate::error::Violation;
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use std::collections::VecDeque;
use std::fmt;

/// The ordered list of structural defects found in a flow. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn contains(&self, predicate: impl Fn(&Violation) -> bool) -> bool {
        self.violations.iter().any(predicate)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return write!(f, "flow is valid");
        }
        write!(f, "{}", self.violations.iter().join("\n"))
    }
}

/// Checks every structural rule a flow must satisfy before it can be activated.
///
/// Validation never stops at the first defect. Violations are reported in a
/// stable order: identity, start/end, edges, per-node rules, reachability, cycles.
pub fn validate(flow: &Flow) -> ValidationReport {
    let mut violations = Vec::new();

    let duplicates = |ids: Vec<&str>| -> Vec<String> {
        ids.into_iter()
            .duplicates()
            .map(String::from)
            .collect()
    };
    for node_id in duplicates(flow.nodes.iter().map(|n| n.id.as_str()).collect()) {
        violations.push(Violation::DuplicateNodeId { node_id });
    }
    for edge_id in duplicates(flow.edges.iter().map(|e| e.id.as_str()).collect()) {
        violations.push(Violation::DuplicateEdgeId { edge_id });
    }

    let kinds: AHashMap<&str, &NodeKind> = flow
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), &n.kind))
        .collect();

    let starts: Vec<String> = flow
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Start))
        .map(|n| n.id.clone())
        .collect();
    match starts.len() {
        0 => violations.push(Violation::MissingStart),
        1 => {}
        _ => violations.push(Violation::MultipleStarts {
            node_ids: starts.clone(),
        }),
    }
    if !flow.nodes.iter().any(|n| matches!(n.kind, NodeKind::End(_))) {
        violations.push(Violation::MissingEnd);
    }

    for edge in &flow.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !kinds.contains_key(endpoint.as_str()) {
                violations.push(Violation::DanglingEdge {
                    edge_id: edge.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
        if let Some(NodeKind::Start) = kinds.get(edge.target.as_str()) {
            violations.push(Violation::EdgeIntoStart {
                edge_id: edge.id.clone(),
            });
        }
        match kinds.get(edge.source.as_str()) {
            Some(NodeKind::End(_)) => violations.push(Violation::EdgeOutOfEnd {
                edge_id: edge.id.clone(),
            }),
            Some(kind) if !guard_allowed(kind, edge.guard) => {
                violations.push(Violation::GuardNotAllowed {
                    edge_id: edge.id.clone(),
                    guard: edge.guard.to_string(),
                    kind: kind.name().to_string(),
                })
            }
            _ => {}
        }
    }

    for node in &flow.nodes {
        let outgoing: Vec<_> = flow.outgoing(&node.id).collect();
        let is_end = matches!(node.kind, NodeKind::End(_));
        if !is_end && outgoing.is_empty() {
            violations.push(Violation::NoOutgoingEdge {
                node_id: node.id.clone(),
            });
        }
        if !matches!(node.kind, NodeKind::Start) && flow.incoming(&node.id).next().is_none() {
            violations.push(Violation::NoIncomingEdge {
                node_id: node.id.clone(),
            });
        }

        match &node.kind {
            NodeKind::Start | NodeKind::Notification(_) if outgoing.len() > 1 => {
                violations.push(Violation::AmbiguousSuccessor {
                    node_id: node.id.clone(),
                    count: outgoing.len(),
                });
            }
            NodeKind::Approval(_) if !outgoing.is_empty() => {
                let approve = outgoing
                    .iter()
                    .filter(|e| matches!(e.guard, EdgeGuard::Always | EdgeGuard::Approve))
                    .count();
                let reject = outgoing
                    .iter()
                    .filter(|e| e.guard == EdgeGuard::Reject)
                    .count();
                if approve == 0 {
                    violations.push(Violation::MissingApproveEdge {
                        node_id: node.id.clone(),
                    });
                }
                if approve > 1 {
                    violations.push(Violation::DuplicateApprovalPort {
                        node_id: node.id.clone(),
                        port: "approve".to_string(),
                    });
                }
                if reject > 1 {
                    violations.push(Violation::DuplicateApprovalPort {
                        node_id: node.id.clone(),
                        port: "reject".to_string(),
                    });
                }
            }
            NodeKind::Condition(config) => {
                if config.default.is_none() {
                    violations.push(Violation::MissingDefaultBranch {
                        node_id: node.id.clone(),
                    });
                }
                let routes = config
                    .branches
                    .iter()
                    .enumerate()
                    .map(|(i, b)| (&b.route, EdgeGuard::Branch(i)))
                    .chain(config.default.iter().map(|r| (r, EdgeGuard::Default)));
                for (route, guard) in routes {
                    let matches = flow.edge(&route.edge).is_some_and(|e| {
                        e.source == node.id && e.target == route.target && e.guard == guard
                    });
                    if !matches {
                        violations.push(Violation::RouteMismatch {
                            node_id: node.id.clone(),
                            edge_id: route.edge.clone(),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    let successors = adjacency(flow, &kinds);
    if let [start] = starts.as_slice() {
        let reached = reachable_from(start, &successors);
        for node in &flow.nodes {
            if !reached.contains(node.id.as_str()) {
                violations.push(Violation::Unreachable {
                    node_id: node.id.clone(),
                });
            }
        }
    }

    if let Some(path) = find_cycle(flow, &successors) {
        violations.push(Violation::Cycle { path });
    }

    ValidationReport { violations }
}

fn guard_allowed(kind: &NodeKind, guard: EdgeGuard) -> bool {
    match kind {
        NodeKind::Start | NodeKind::Notification(_) => guard == EdgeGuard::Always,
        NodeKind::Approval(_) => matches!(
            guard,
            EdgeGuard::Always | EdgeGuard::Approve | EdgeGuard::Reject
        ),
        NodeKind::Condition(_) => matches!(guard, EdgeGuard::Branch(_) | EdgeGuard::Default),
        NodeKind::End(_) => false,
    }
}

/// Successor lists in edge declaration order, ignoring dangling edges.
fn adjacency<'a>(
    flow: &'a Flow,
    kinds: &AHashMap<&str, &NodeKind>,
) -> AHashMap<&'a str, Vec<&'a str>> {
    let mut adjacency: AHashMap<&str, Vec<&str>> = AHashMap::new();
    for edge in &flow.edges {
        if kinds.contains_key(edge.source.as_str()) && kinds.contains_key(edge.target.as_str()) {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }
    }
    adjacency
}

fn reachable_from<'a>(start: &'a str, adjacency: &AHashMap<&'a str, Vec<&'a str>>) -> AHashSet<&'a str> {
    let mut reached = AHashSet::new();
    let mut queue = VecDeque::from([start]);
    reached.insert(start);
    while let Some(current) = queue.pop_front() {
        for next in adjacency.get(current).into_iter().flatten() {
            if reached.insert(*next) {
                queue.push_back(*next);
            }
        }
    }
    reached
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first search with three colours. Returns the first cycle found as a
/// closed path, e.g. `["a", "b", "a"]`.
fn find_cycle(flow: &Flow, adjacency: &AHashMap<&str, Vec<&str>>) -> Option<Vec<String>> {
    let mut marks: AHashMap<&str, Mark> = flow
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), Mark::Unvisited))
        .collect();

    for root in &flow.nodes {
        if marks.get(root.id.as_str()) != Some(&Mark::Unvisited) {
            continue;
        }
        // Explicit stack of (node, index of next successor to visit).
        let mut stack: Vec<(&str, usize)> = vec![(root.id.as_str(), 0)];
        marks.insert(root.id.as_str(), Mark::InProgress);

        while let Some((current, next_index)) = stack.last().copied() {
            let successors = adjacency.get(current).map(Vec::as_slice).unwrap_or(&[]);
            match successors.get(next_index) {
                Some(&next) => {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    match marks.get(next).copied().unwrap_or(Mark::Done) {
                        Mark::Unvisited => {
                            marks.insert(next, Mark::InProgress);
                            stack.push((next, 0));
                        }
                        Mark::InProgress => {
                            let mut path: Vec<String> = stack
                                .iter()
                                .map(|(id, _)| *id)
                                .skip_while(|id| *id != next)
                                .map(String::from)
                                .collect();
                            path.push(next.to_string());
                            return Some(path);
                        }
                        Mark::Done => {}
                    }
                }
                None => {
                    marks.insert(current, Mark::Done);
                    stack.pop();
                }
            }
        }
    }
    None
}

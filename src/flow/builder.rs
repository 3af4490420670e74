use super::definition::{EdgeSpec, FlowSpec, NodeSpec};
use super::model::{Edge, EdgeGuard, Flow, FlowStatus, Node, NodeKind};
use super::parsing::{NodeParser, create_parser_by_name, register_default_parsers};
use crate::error::BuildError;
use ahash::{AHashMap, AHashSet};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

/// Builds a Draft [`Flow`] from node and edge specifications.
///
/// Node kinds are resolved through a parser registry, so callers with their own
/// vocabulary can map it onto the built-in kinds with [`FlowBuilder::with_kind_alias`].
pub struct FlowBuilder {
    name: String,
    description: String,
    created_by: String,
    nodes: Vec<NodeSpec>,
    edges: Vec<EdgeSpec>,
    registry: AHashMap<String, Box<dyn NodeParser>>,
}

impl FlowBuilder {
    pub fn new(name: &str) -> Self {
        let mut registry: AHashMap<String, Box<dyn NodeParser>> = AHashMap::new();
        register_default_parsers(&mut registry);
        Self {
            name: name.to_string(),
            description: String::new(),
            created_by: "system".to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
            registry,
        }
    }

    pub fn from_spec(spec: FlowSpec) -> Self {
        Self::new(&spec.name)
            .description(&spec.description)
            .nodes(spec.nodes)
            .edges(spec.edges)
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn created_by(mut self, actor: &str) -> Self {
        self.created_by = actor.to_string();
        self
    }

    /// Lets nodes declared as `user_kind` be parsed as the built-in `builtin_kind`.
    pub fn with_kind_alias(mut self, user_kind: &str, builtin_kind: &str) -> Self {
        if let Some(parser) = create_parser_by_name(builtin_kind) {
            self.registry.insert(user_kind.to_string(), parser);
        }
        self
    }

    pub fn with_custom_parser(mut self, parser: Box<dyn NodeParser>) -> Self {
        self.registry.insert(parser.kind().to_string(), parser);
        self
    }

    pub fn nodes(mut self, nodes: Vec<NodeSpec>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    pub fn node(mut self, node: NodeSpec) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn edges(mut self, edges: Vec<EdgeSpec>) -> Self {
        self.edges.extend(edges);
        self
    }

    pub fn edge(mut self, edge: EdgeSpec) -> Self {
        self.edges.push(edge);
        self
    }

    fn parser_for(&self, kind: &str) -> Option<&dyn NodeParser> {
        self.registry
            .get(kind)
            .or_else(|| self.registry.get(&kind.to_ascii_lowercase()))
            .map(|p| p.as_ref())
    }

    /// Resolves every node, compiles every predicate and wires the edges.
    ///
    /// The result is always a Draft with version 1; the registry assigns the
    /// real version on registration. Structural rules that need the whole graph
    /// (reachability, acyclicity) are left to [`super::validate`].
    pub fn build(self) -> Result<Flow, BuildError> {
        let mut seen = AHashSet::new();
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for spec in &self.nodes {
            if !seen.insert(spec.id.as_str()) {
                return Err(BuildError::DuplicateNodeId {
                    node_id: spec.id.clone(),
                });
            }
            let parser = self
                .parser_for(&spec.kind)
                .ok_or_else(|| BuildError::InvalidNodeKind {
                    node_id: spec.id.clone(),
                    kind_name: spec.kind.clone(),
                })?;
            let label = if spec.label.is_empty() {
                spec.id.clone()
            } else {
                spec.label.clone()
            };
            nodes.push(Node {
                id: spec.id.clone(),
                label,
                kind: parser.parse(spec)?,
            });
        }

        let kinds: AHashMap<&str, &NodeKind> =
            nodes.iter().map(|n| (n.id.as_str(), &n.kind)).collect();
        let require = |node_id: &str, source_id: &str| {
            if kinds.contains_key(node_id) {
                Ok(())
            } else {
                Err(BuildError::NodeNotFound {
                    missing_node_id: node_id.to_string(),
                    source_id: source_id.to_string(),
                })
            }
        };

        let mut edges = Vec::with_capacity(self.edges.len());
        for spec in &self.edges {
            let guard = parse_port(spec)?;
            let id = spec.id.clone().unwrap_or_else(|| {
                format!("{}:{}->{}", spec.source, guard, spec.target)
            });
            require(&spec.source, &id)?;
            require(&spec.target, &id)?;
            if let Some(NodeKind::Condition(_)) = kinds.get(spec.source.as_str()) {
                return Err(BuildError::ConditionEdge {
                    edge_id: id,
                    node_id: spec.source.clone(),
                });
            }
            edges.push(Edge {
                id,
                source: spec.source.clone(),
                target: spec.target.clone(),
                guard,
            });
        }

        // Condition routes become guarded edges, in declaration order.
        for node in &nodes {
            if let NodeKind::Condition(config) = &node.kind {
                for (index, branch) in config.branches.iter().enumerate() {
                    require(&branch.route.target, &node.id)?;
                    edges.push(Edge {
                        id: branch.route.edge.clone(),
                        source: node.id.clone(),
                        target: branch.route.target.clone(),
                        guard: EdgeGuard::Branch(index),
                    });
                }
                if let Some(route) = &config.default {
                    require(&route.target, &node.id)?;
                    edges.push(Edge {
                        id: route.edge.clone(),
                        source: node.id.clone(),
                        target: route.target.clone(),
                        guard: EdgeGuard::Default,
                    });
                }
            }
        }

        let mut edge_ids = AHashSet::new();
        if let Some(duplicate) = edges.iter().find(|e| !edge_ids.insert(e.id.as_str())) {
            return Err(BuildError::DuplicateEdgeId {
                edge_id: duplicate.id.clone(),
            });
        }

        debug!(
            flow = %self.name,
            nodes = nodes.len(),
            edges = edges.len(),
            "built flow graph"
        );

        Ok(Flow {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            version: 1,
            status: FlowStatus::Draft,
            nodes,
            edges,
            created_by: self.created_by,
            created_at: Utc::now(),
            activated_at: None,
            activated_by: None,
            retired_at: None,
            retired_by: None,
        })
    }
}

fn parse_port(spec: &EdgeSpec) -> Result<EdgeGuard, BuildError> {
    match spec.port.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("") | Some("output") | Some("next") => Ok(EdgeGuard::Always),
        Some("approve") | Some("approved") => Ok(EdgeGuard::Approve),
        Some("reject") | Some("rejected") => Ok(EdgeGuard::Reject),
        Some(other) => Err(BuildError::InvalidPort {
            edge_id: spec
                .id
                .clone()
                .unwrap_or_else(|| format!("{}->{}", spec.source, spec.target)),
            port: other.to_string(),
        }),
    }
}

/// Builds an unnamed Draft flow with the default parser registry.
pub fn build(nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>) -> Result<Flow, BuildError> {
    FlowBuilder::new("untitled").nodes(nodes).edges(edges).build()
}

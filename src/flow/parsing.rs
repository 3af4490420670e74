use super::definition::NodeSpec;
use super::model::{
    ApprovalConfig, Branch, ConditionConfig, EndConfig, NodeKind, NotificationConfig, Route,
};
use crate::compiler::compile_predicate;
use crate::error::BuildError;
use ahash::AHashMap;
use serde_json::Value as JsonValue;

/// Defines the contract for turning a node's `kind` and `properties` into a typed [`NodeKind`].
pub trait NodeParser: Send + Sync {
    fn kind(&self) -> &str;
    fn parse(&self, node: &NodeSpec) -> Result<NodeKind, BuildError>;
}

/// Edge id generated for the condition route at `index`.
pub fn branch_edge_id(node_id: &str, index: usize) -> String {
    format!("{}:branch{}", node_id, index)
}

/// Edge id generated for a condition node's default route.
pub fn default_edge_id(node_id: &str) -> String {
    format!("{}:default", node_id)
}

/// Looks up the first present key among `keys`.
fn property<'a>(node: &'a NodeSpec, keys: &[&str]) -> Option<&'a JsonValue> {
    keys.iter()
        .find_map(|k| node.properties.get(*k))
        .filter(|v| !v.is_null())
}

fn string_property(
    node: &NodeSpec,
    keys: &[&str],
) -> Result<Option<String>, BuildError> {
    match property(node, keys) {
        None => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(BuildError::InvalidProperty {
            node_id: node.id.clone(),
            property: keys[0].to_string(),
            message: format!("expected a string, found {}", other),
        }),
    }
}

fn days_property(node: &NodeSpec, keys: &[&str]) -> Result<Option<u32>, BuildError> {
    let invalid = |message: String| BuildError::InvalidProperty {
        node_id: node.id.clone(),
        property: keys[0].to_string(),
        message,
    };
    match property(node, keys) {
        None => Ok(None),
        Some(JsonValue::Number(n)) => n
            .as_u64()
            .and_then(|d| u32::try_from(d).ok())
            .map(Some)
            .ok_or_else(|| invalid(format!("expected a whole number of days, found {}", n))),
        Some(JsonValue::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(format!("expected a whole number of days, found '{}'", s))),
        Some(other) => Err(invalid(format!("expected a number, found {}", other))),
    }
}

struct StartParser;

impl NodeParser for StartParser {
    fn kind(&self) -> &str {
        "start"
    }

    fn parse(&self, _node: &NodeSpec) -> Result<NodeKind, BuildError> {
        Ok(NodeKind::Start)
    }
}

struct ApprovalParser;

impl NodeParser for ApprovalParser {
    fn kind(&self) -> &str {
        "approval"
    }

    fn parse(&self, node: &NodeSpec) -> Result<NodeKind, BuildError> {
        let role = string_property(node, &["approverType", "role"])?
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| BuildError::MissingProperty {
                node_id: node.id.clone(),
                property: "approverType".to_string(),
            })?;
        Ok(NodeKind::Approval(ApprovalConfig {
            role,
            timeout_days: days_property(node, &["timeoutDays", "timeout_days"])?,
            reminder_days: days_property(node, &["reminderDays", "reminder_days"])?,
            escalate_to: string_property(node, &["escalationTo", "escalate_to"])?,
        }))
    }
}

struct NotificationParser;

impl NodeParser for NotificationParser {
    fn kind(&self) -> &str {
        "notification"
    }

    fn parse(&self, node: &NodeSpec) -> Result<NodeKind, BuildError> {
        // Recipients come either as "creator,manager" or as a JSON array.
        let recipients = match property(node, &["recipients"]) {
            None => Vec::new(),
            Some(JsonValue::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect(),
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(String::from).ok_or_else(|| {
                        BuildError::InvalidProperty {
                            node_id: node.id.clone(),
                            property: "recipients".to_string(),
                            message: format!("expected a string recipient, found {}", item),
                        }
                    })
                })
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(BuildError::InvalidProperty {
                    node_id: node.id.clone(),
                    property: "recipients".to_string(),
                    message: format!("expected a list of recipients, found {}", other),
                });
            }
        };
        Ok(NodeKind::Notification(NotificationConfig {
            recipients,
            subject: string_property(node, &["subject"])?.unwrap_or_default(),
            message: string_property(node, &["message"])?.unwrap_or_default(),
        }))
    }
}

struct EndParser;

impl NodeParser for EndParser {
    fn kind(&self) -> &str {
        "end"
    }

    fn parse(&self, node: &NodeSpec) -> Result<NodeKind, BuildError> {
        Ok(NodeKind::End(EndConfig {
            final_status: string_property(node, &["finalStatus", "final_status"])?,
        }))
    }
}

/// Parses `branches: [{ "when": "<predicate>", "target": "<node>" }]` and an
/// optional `default: "<node>"`. Every predicate is compiled here, exactly once.
struct ConditionParser;

impl ConditionParser {
    fn target_of(node: &NodeSpec, entry: &JsonValue, index: usize) -> Result<String, BuildError> {
        entry
            .get("target")
            .and_then(JsonValue::as_str)
            .map(String::from)
            .ok_or_else(|| BuildError::InvalidProperty {
                node_id: node.id.clone(),
                property: format!("branches[{}].target", index),
                message: "expected a target node id".to_string(),
            })
    }
}

impl NodeParser for ConditionParser {
    fn kind(&self) -> &str {
        "condition"
    }

    fn parse(&self, node: &NodeSpec) -> Result<NodeKind, BuildError> {
        let entries = match property(node, &["branches"]) {
            Some(JsonValue::Array(entries)) => entries,
            Some(other) => {
                return Err(BuildError::InvalidProperty {
                    node_id: node.id.clone(),
                    property: "branches".to_string(),
                    message: format!("expected an array of branches, found {}", other),
                });
            }
            None => {
                return Err(BuildError::MissingProperty {
                    node_id: node.id.clone(),
                    property: "branches".to_string(),
                });
            }
        };

        let mut branches = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let source = entry
                .get("when")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| BuildError::InvalidProperty {
                    node_id: node.id.clone(),
                    property: format!("branches[{}].when", index),
                    message: "expected a predicate string".to_string(),
                })?;
            let expression =
                compile_predicate(source).map_err(|e| BuildError::InvalidPredicate {
                    node_id: node.id.clone(),
                    predicate: source.to_string(),
                    position: e.position,
                    message: e.message,
                })?;
            branches.push(Branch {
                source: source.to_string(),
                expression,
                route: Route {
                    edge: branch_edge_id(&node.id, index),
                    target: Self::target_of(node, entry, index)?,
                },
            });
        }

        let default = string_property(node, &["default"])?.map(|target| Route {
            edge: default_edge_id(&node.id),
            target,
        });

        Ok(NodeKind::Condition(ConditionConfig { branches, default }))
    }
}

pub(super) fn register_default_parsers(registry: &mut AHashMap<String, Box<dyn NodeParser>>) {
    let parsers: [Box<dyn NodeParser>; 5] = [
        Box::new(StartParser),
        Box::new(ApprovalParser),
        Box::new(ConditionParser),
        Box::new(NotificationParser),
        Box::new(EndParser),
    ];
    for parser in parsers {
        registry.insert(parser.kind().to_string(), parser);
    }
}

pub(super) fn create_parser_by_name(name: &str) -> Option<Box<dyn NodeParser>> {
    match name {
        "start" => Some(Box::new(StartParser)),
        "approval" => Some(Box::new(ApprovalParser)),
        "condition" => Some(Box::new(ConditionParser)),
        "notification" => Some(Box::new(NotificationParser)),
        "end" => Some(Box::new(EndParser)),
        _ => None,
    }
}

use super::definition::{EdgeSpec, FlowSpec, NodeSpec};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// Preset flow shapes for common MPR approval processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// Start, Manager Approval, Budget Approval, End.
    Simple,
    /// Budget-based routing to Executive or Manager approval, then a notification.
    Conditional,
    /// Two routing stages with notifications at submission and completion.
    Comprehensive,
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Template::Simple => "simple",
            Template::Conditional => "conditional",
            Template::Comprehensive => "comprehensive",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Template {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Template::Simple),
            "conditional" => Ok(Template::Conditional),
            "comprehensive" => Ok(Template::Comprehensive),
            other => Err(format!("unknown template '{}'", other)),
        }
    }
}

fn approval(id: &str, label: &str, role: &str, timeout: u32, reminder: u32, escalate: &str) -> NodeSpec {
    NodeSpec::new(id, "approval", label)
        .with_property("approverType", json!(role))
        .with_property("timeoutDays", json!(timeout))
        .with_property("reminderDays", json!(reminder))
        .with_property("escalationTo", json!(escalate))
}

fn notification(id: &str, label: &str, recipients: &str, subject: &str, message: &str) -> NodeSpec {
    NodeSpec::new(id, "notification", label)
        .with_property("recipients", json!(recipients))
        .with_property("subject", json!(subject))
        .with_property("message", json!(message))
}

fn condition(id: &str, label: &str, when: &str, target: &str, default: &str) -> NodeSpec {
    NodeSpec::new(id, "condition", label)
        .with_property("branches", json!([{ "when": when, "target": target }]))
        .with_property("default", json!(default))
}

fn end(id: &str, label: &str) -> NodeSpec {
    NodeSpec::new(id, "end", label).with_property("finalStatus", json!("approved"))
}

fn chain(pairs: &[(&str, &str)]) -> Vec<EdgeSpec> {
    pairs
        .iter()
        .map(|(source, target)| EdgeSpec::new(source, target))
        .collect()
}

impl Template {
    pub const ALL: [Template; 3] = [
        Template::Simple,
        Template::Conditional,
        Template::Comprehensive,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            Template::Simple => "Simple approval flow: Manager -> Budget Holder",
            Template::Conditional => "Conditional approval flow based on budget amount",
            Template::Comprehensive => {
                "Comprehensive multi-stage approval flow with conditions and notifications"
            }
        }
    }

    /// Produces the flow specification for this template under the given name.
    pub fn spec(&self, name: &str) -> FlowSpec {
        let (nodes, edges) = match self {
            Template::Simple => (
                vec![
                    NodeSpec::new("start_1", "start", "Flow Start"),
                    approval("approval_1", "Manager Approval", "manager", 5, 3, "manager"),
                    approval(
                        "approval_2",
                        "Budget Approval",
                        "budget_holder",
                        7,
                        5,
                        "budget_sponsor",
                    ),
                    end("end_1", "Flow End"),
                ],
                chain(&[
                    ("start_1", "approval_1"),
                    ("approval_1", "approval_2"),
                    ("approval_2", "end_1"),
                ]),
            ),
            Template::Conditional => (
                vec![
                    NodeSpec::new("start_1", "start", "Flow Start"),
                    condition(
                        "condition_1",
                        "Budget Check",
                        "budget_amount > 50000",
                        "approval_1",
                        "approval_2",
                    ),
                    approval("approval_1", "Executive Approval", "budget_sponsor", 3, 2, "ceo"),
                    approval("approval_2", "Manager Approval", "manager", 5, 3, "budget_holder"),
                    notification(
                        "notification_1",
                        "Approval Notification",
                        "creator,manager,recruiter",
                        "MPR Approved: {position}",
                        "The MPR for {position} has been approved and is ready for next steps.",
                    ),
                    end("end_1", "Flow End"),
                ],
                chain(&[
                    ("start_1", "condition_1"),
                    ("approval_1", "notification_1"),
                    ("approval_2", "notification_1"),
                    ("notification_1", "end_1"),
                ]),
            ),
            Template::Comprehensive => (
                vec![
                    NodeSpec::new("start_1", "start", "MPR Submission"),
                    notification(
                        "notification_1",
                        "Submission Notification",
                        "creator,manager",
                        "MPR Submitted: {position}",
                        "A new MPR for {position} has been submitted and is now in the approval process.",
                    ),
                    condition(
                        "condition_1",
                        "Initial Routing",
                        "employment_type == \"contractor\" OR budget_amount < 25000",
                        "approval_1",
                        "approval_2",
                    ),
                    approval("approval_1", "Quick Approval", "manager", 3, 2, "budget_holder"),
                    approval("approval_2", "Manager Approval", "manager", 5, 3, "budget_holder"),
                    condition(
                        "condition_2",
                        "Budget Check",
                        "budget_amount > 50000",
                        "approval_4",
                        "approval_3",
                    ),
                    approval(
                        "approval_3",
                        "Budget Holder Approval",
                        "budget_holder",
                        7,
                        5,
                        "budget_sponsor",
                    ),
                    approval("approval_4", "Executive Approval", "budget_sponsor", 5, 3, "ceo"),
                    notification(
                        "notification_2",
                        "Final Notification",
                        "creator,manager,recruiter,hr_director",
                        "MPR Fully Approved: {position}",
                        "The MPR for {position} has completed all approval stages and is ready for job posting.",
                    ),
                    end("end_1", "Flow Complete"),
                ],
                chain(&[
                    ("start_1", "notification_1"),
                    ("notification_1", "condition_1"),
                    ("approval_1", "notification_2"),
                    ("approval_2", "condition_2"),
                    ("approval_3", "notification_2"),
                    ("approval_4", "notification_2"),
                    ("notification_2", "end_1"),
                ]),
            ),
        };

        FlowSpec {
            name: name.to_string(),
            description: self.description().to_string(),
            nodes,
            edges,
        }
    }
}

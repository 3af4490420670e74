use crate::execution::{Execution, ExecutionStatus};
use crate::flow::{Flow, FlowId, FlowStatus};
use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFlowSummary {
    pub id: FlowId,
    pub name: String,
    pub version: u32,
    pub activated_at: Option<DateTime<Utc>>,
    pub node_count: usize,
    pub execution_count: usize,
}

/// Aggregate counts over the registry at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub total_flows: usize,
    pub flows_by_status: Vec<(FlowStatus, usize)>,
    pub active_flow: Option<ActiveFlowSummary>,
    pub total_executions: usize,
    pub executions_by_status: Vec<(ExecutionStatus, usize)>,
    /// Mean start-to-end time of completed executions.
    pub average_completion: Option<Duration>,
    pub oldest_execution_age: Option<Duration>,
    pub pending_approvals: usize,
}

impl Statistics {
    pub(super) fn collect<'a>(
        flows: impl Iterator<Item = &'a Flow>,
        active: Option<&Flow>,
        executions: &[&Execution],
        now: DateTime<Utc>,
    ) -> Self {
        let flows: Vec<&Flow> = flows.collect();
        let flows_by_status = flows
            .iter()
            .map(|f| f.status)
            .counts()
            .into_iter()
            .sorted()
            .collect();
        let executions_by_status = executions
            .iter()
            .map(|e| e.status)
            .counts()
            .into_iter()
            .sorted()
            .collect();

        let completed: Vec<Duration> = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .filter_map(|e| e.duration())
            .collect();
        let average_completion = if completed.is_empty() {
            None
        } else {
            let total_ms: i64 = completed.iter().map(|d| d.num_milliseconds()).sum();
            Some(Duration::milliseconds(total_ms / completed.len() as i64))
        };

        let active_flow = active.map(|flow| ActiveFlowSummary {
            id: flow.id,
            name: flow.name.clone(),
            version: flow.version,
            activated_at: flow.activated_at,
            node_count: flow.node_count(),
            execution_count: executions
                .iter()
                .filter(|e| e.flow == flow.flow_ref())
                .count(),
        });

        Self {
            total_flows: flows.len(),
            flows_by_status,
            active_flow,
            total_executions: executions.len(),
            executions_by_status,
            average_completion,
            oldest_execution_age: executions.iter().map(|e| e.started_at).min().map(|t| now - t),
            pending_approvals: executions
                .iter()
                .filter(|e| e.pending_approval().is_some())
                .count(),
        }
    }

    pub fn flows_with_status(&self, status: FlowStatus) -> usize {
        self.flows_by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |(_, n)| *n)
    }

    pub fn executions_with_status(&self, status: ExecutionStatus) -> usize {
        self.executions_by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |(_, n)| *n)
    }
}

fn format_duration(d: Duration) -> String {
    if d.num_days() > 0 {
        format!("{}d {}h", d.num_days(), d.num_hours() % 24)
    } else if d.num_hours() > 0 {
        format!("{}h {}m", d.num_hours(), d.num_minutes() % 60)
    } else if d.num_minutes() > 0 {
        format!("{}m {}s", d.num_minutes(), d.num_seconds() % 60)
    } else {
        format!("{}ms", d.num_milliseconds())
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Flows: {}", self.total_flows)?;
        for (status, count) in &self.flows_by_status {
            writeln!(f, "  {}: {}", status, count)?;
        }
        writeln!(f, "Executions: {}", self.total_executions)?;
        for (status, count) in &self.executions_by_status {
            writeln!(f, "  {}: {}", status, count)?;
        }
        if let Some(avg) = self.average_completion {
            writeln!(f, "Average completion: {}", format_duration(avg))?;
        }
        if let Some(age) = self.oldest_execution_age {
            writeln!(f, "Oldest execution: {} ago", format_duration(age))?;
        }
        match &self.active_flow {
            Some(active) => {
                writeln!(f, "Active flow: {} v{} ({})", active.name, active.version, active.id)?;
                if let Some(at) = active.activated_at {
                    writeln!(f, "  activated: {}", at.format("%Y-%m-%d %H:%M:%S"))?;
                }
                writeln!(f, "  nodes: {}", active.node_count)?;
                writeln!(f, "  executions: {}", active.execution_count)?;
            }
            None => writeln!(f, "No active flow configured")?,
        }
        write!(f, "Pending approvals: {}", self.pending_approvals)
    }
}

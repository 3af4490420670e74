//! The flow registry: owns every flow version and execution, and guarantees that
//! at most one flow is active at any instant.

use crate::config::EngineConfig;
use crate::data::Payload;
use crate::error::{RegistryError, StoreError};
use crate::execution::{
    Decision, Execution, ExecutionEngine, ExecutionId, ExecutionStatus, PendingApproval,
};
use crate::flow::{
    EdgeSpec, Flow, FlowBuilder, FlowId, FlowSpec, FlowStatus, NodeSpec, Template,
    ValidationReport, validate,
};
use crate::store::Snapshot;
use ahash::AHashMap;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

mod stats;

pub use stats::{ActiveFlowSummary, Statistics};

#[derive(Debug, Clone, Default)]
pub struct FlowFilter {
    pub status: Option<FlowStatus>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub flow: Option<FlowId>,
    pub status: Option<ExecutionStatus>,
}

/// The flow table and the active record live under one lock, so activation
/// can swap them in a single critical section.
#[derive(Default)]
struct FlowTable {
    flows: AHashMap<FlowId, Arc<Flow>>,
    active: Option<FlowId>,
}

impl FlowTable {
    fn get(&self, id: FlowId) -> Result<&Arc<Flow>, RegistryError> {
        self.flows.get(&id).ok_or(RegistryError::FlowNotFound(id))
    }

    fn get_mut(&mut self, id: FlowId) -> Result<&mut Flow, RegistryError> {
        self.flows
            .get_mut(&id)
            .map(Arc::make_mut)
            .ok_or(RegistryError::FlowNotFound(id))
    }
}

/// Shared, thread-safe store of flows and executions.
///
/// Lock order is flows, then executions. No method holds the execution lock
/// while acquiring the flow lock.
pub struct FlowRegistry {
    config: EngineConfig,
    engine: ExecutionEngine,
    flows: RwLock<FlowTable>,
    executions: RwLock<AHashMap<ExecutionId, Execution>>,
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl FlowRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engine: ExecutionEngine::new(&config),
            config,
            flows: RwLock::new(FlowTable::default()),
            executions: RwLock::new(AHashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    fn actor<'a>(&'a self, actor: &'a str) -> &'a str {
        if actor.is_empty() {
            &self.config.default_actor
        } else {
            actor
        }
    }

    // --- Flow lifecycle ---

    /// Stores a Draft flow, assigning the next version number for its name.
    pub fn register(&self, mut flow: Flow) -> Result<Arc<Flow>, RegistryError> {
        if !flow.is_editable() {
            return Err(RegistryError::NotDraft {
                flow_id: flow.id,
                status: flow.status,
            });
        }
        let mut table = self.flows.write();
        flow.version = table
            .flows
            .values()
            .filter(|f| f.name == flow.name)
            .map(|f| f.version)
            .max()
            .unwrap_or(0)
            + 1;
        while table.flows.contains_key(&flow.id) {
            flow.id = Uuid::new_v4();
        }
        info!(flow = %flow.id, name = %flow.name, version = flow.version, "flow registered");
        let flow = Arc::new(flow);
        table.flows.insert(flow.id, Arc::clone(&flow));
        Ok(flow)
    }

    /// Builds and registers a flow from a declarative spec.
    pub fn create(&self, spec: FlowSpec, actor: &str) -> Result<Arc<Flow>, RegistryError> {
        let flow = FlowBuilder::from_spec(spec)
            .created_by(self.actor(actor))
            .build()?;
        self.register(flow)
    }

    pub fn create_from_template(
        &self,
        template: Template,
        name: &str,
        actor: &str,
    ) -> Result<Arc<Flow>, RegistryError> {
        self.create(template.spec(name), actor)
    }

    /// Registers a new Draft version of an existing flow with the same graph.
    pub fn fork(&self, flow_id: FlowId, actor: &str) -> Result<Arc<Flow>, RegistryError> {
        let source = self.get(flow_id)?;
        let mut draft = (*source).clone();
        draft.id = Uuid::new_v4();
        draft.status = FlowStatus::Draft;
        draft.created_by = self.actor(actor).to_string();
        draft.created_at = Utc::now();
        draft.activated_at = None;
        draft.activated_by = None;
        draft.retired_at = None;
        draft.retired_by = None;
        self.register(draft)
    }

    /// Rebuilds the graph of a Draft flow in place.
    pub fn replace_graph(
        &self,
        flow_id: FlowId,
        nodes: Vec<NodeSpec>,
        edges: Vec<EdgeSpec>,
    ) -> Result<Arc<Flow>, RegistryError> {
        let mut table = self.flows.write();
        let current = table.get(flow_id)?;
        if !current.is_editable() {
            return Err(RegistryError::NotDraft {
                flow_id,
                status: current.status,
            });
        }
        let rebuilt = FlowBuilder::new(&current.name)
            .nodes(nodes)
            .edges(edges)
            .build()?;
        let flow = table.get_mut(flow_id)?;
        flow.nodes = rebuilt.nodes;
        flow.edges = rebuilt.edges;
        debug!(flow = %flow_id, "flow graph replaced");
        table.get(flow_id).cloned()
    }

    /// Retires a Draft that will never be activated.
    pub fn archive(&self, flow_id: FlowId, actor: &str) -> Result<Arc<Flow>, RegistryError> {
        let mut table = self.flows.write();
        let flow = table.get_mut(flow_id)?;
        if flow.status != FlowStatus::Draft {
            return Err(RegistryError::InvalidTransition {
                flow_id,
                from: flow.status,
                to: FlowStatus::Archived,
            });
        }
        flow.status = FlowStatus::Archived;
        flow.retired_at = Some(Utc::now());
        flow.retired_by = Some(self.actor(actor).to_string());
        info!(flow = %flow_id, "flow archived");
        table.get(flow_id).cloned()
    }

    /// Makes a Draft the single active flow, retiring the previous one.
    ///
    /// The flow must pass [`validate`]. Retiring the old flow and activating
    /// the new one happen under one write lock, so no reader ever observes zero
    /// or two active flows. Activating the already-active flow is a no-op.
    pub fn activate(&self, flow_id: FlowId, actor: &str) -> Result<Arc<Flow>, RegistryError> {
        let actor = self.actor(actor).to_string();
        let mut table = self.flows.write();
        let target = table.get(flow_id)?;
        match target.status {
            FlowStatus::Active => return Ok(Arc::clone(target)),
            FlowStatus::Draft => {}
            other => {
                return Err(RegistryError::InvalidTransition {
                    flow_id,
                    from: other,
                    to: FlowStatus::Active,
                });
            }
        }
        let report = validate(target);
        if !report.is_valid() {
            return Err(RegistryError::ValidationFailed {
                flow_id,
                violations: report.violations,
            });
        }

        let now = Utc::now();
        if let Some(previous_id) = table.active.take() {
            let previous = table.get_mut(previous_id)?;
            previous.status = FlowStatus::Inactive;
            previous.retired_at = Some(now);
            previous.retired_by = Some(actor.clone());
            info!(flow = %previous_id, version = previous.version, "flow retired");
        }
        let flow = table.get_mut(flow_id)?;
        flow.status = FlowStatus::Active;
        flow.activated_at = Some(now);
        flow.activated_by = Some(actor);
        info!(flow = %flow_id, name = %flow.name, version = flow.version, "flow activated");
        table.active = Some(flow_id);
        table.get(flow_id).cloned()
    }

    /// Retires the active flow, leaving none active.
    pub fn deactivate(&self, actor: &str) -> Result<Option<Arc<Flow>>, RegistryError> {
        let mut table = self.flows.write();
        let Some(active_id) = table.active.take() else {
            return Ok(None);
        };
        let flow = table.get_mut(active_id)?;
        flow.status = FlowStatus::Inactive;
        flow.retired_at = Some(Utc::now());
        flow.retired_by = Some(self.actor(actor).to_string());
        info!(flow = %active_id, "flow deactivated");
        table.get(active_id).cloned().map(Some)
    }

    // --- Flow queries ---

    pub fn get(&self, flow_id: FlowId) -> Result<Arc<Flow>, RegistryError> {
        self.flows.read().get(flow_id).cloned()
    }

    pub fn active(&self) -> Option<Arc<Flow>> {
        let table = self.flows.read();
        table.active.and_then(|id| table.flows.get(&id).cloned())
    }

    /// Flows matching `filter`, ordered by name then newest version first.
    pub fn list(&self, filter: &FlowFilter) -> Vec<Arc<Flow>> {
        let table = self.flows.read();
        let mut flows: Vec<Arc<Flow>> = table
            .flows
            .values()
            .filter(|f| filter.status.is_none_or(|s| f.status == s))
            .filter(|f| filter.name.as_ref().is_none_or(|n| &f.name == n))
            .cloned()
            .collect();
        flows.sort_by(|a, b| a.name.cmp(&b.name).then(b.version.cmp(&a.version)));
        flows
    }

    pub fn validate(&self, flow_id: FlowId) -> Result<ValidationReport, RegistryError> {
        let flow = self.get(flow_id)?;
        Ok(validate(&flow))
    }

    // --- Executions ---

    /// Starts an execution against `flow_id`, or the active flow when `None`.
    ///
    /// An execution that fails while running is stored with its trace before
    /// the error is returned.
    pub fn start_execution(
        &self,
        flow_id: Option<FlowId>,
        payload: Payload,
    ) -> Result<Execution, RegistryError> {
        let flow = match flow_id {
            Some(id) => self.get(id)?,
            None => self.active().ok_or(RegistryError::NoActiveFlow)?,
        };
        let mut execution = self.engine.begin(&flow, payload)?;
        let result = self.engine.run(&flow, &mut execution);
        info!(
            execution = %execution.id,
            flow = %flow.flow_ref(),
            status = %execution.status,
            "execution started"
        );
        self.executions
            .write()
            .insert(execution.id, execution.clone());
        match result {
            Ok(()) => Ok(execution),
            Err(source) => Err(RegistryError::RunFailed {
                execution_id: execution.id,
                source,
            }),
        }
    }

    /// Records an approval decision and continues the execution.
    pub fn resume_execution(
        &self,
        execution_id: ExecutionId,
        mut decision: Decision,
    ) -> Result<Execution, RegistryError> {
        if decision.actor.is_empty() {
            decision.actor = self.config.default_actor.clone();
        }
        let bound = self.execution(execution_id)?.flow;
        let flow = self.get(bound.id)?;

        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(&execution_id)
            .ok_or(RegistryError::ExecutionNotFound(execution_id))?;
        self.engine.resume(&flow, execution, decision)?;
        Ok(execution.clone())
    }

    pub fn abandon_execution(
        &self,
        execution_id: ExecutionId,
        actor: &str,
        reason: &str,
    ) -> Result<Execution, RegistryError> {
        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(&execution_id)
            .ok_or(RegistryError::ExecutionNotFound(execution_id))?;
        self.engine.abandon(execution, self.actor(actor), reason)?;
        Ok(execution.clone())
    }

    /// Dry-runs a flow in any status, auto-approving every approval. Nothing is stored.
    pub fn simulate(
        &self,
        flow_id: FlowId,
        payload: Payload,
        actor: &str,
    ) -> Result<Execution, RegistryError> {
        let flow = self.get(flow_id)?;
        Ok(self.engine.simulate(&flow, payload, self.actor(actor)))
    }

    pub fn execution(&self, execution_id: ExecutionId) -> Result<Execution, RegistryError> {
        self.executions
            .read()
            .get(&execution_id)
            .cloned()
            .ok_or(RegistryError::ExecutionNotFound(execution_id))
    }

    /// Executions matching `filter`, newest first.
    pub fn executions(&self, filter: &ExecutionFilter) -> Vec<Execution> {
        let executions = self.executions.read();
        let mut matching: Vec<Execution> = executions
            .values()
            .filter(|e| filter.flow.is_none_or(|id| e.flow.id == id))
            .filter(|e| filter.status.is_none_or(|s| e.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        matching
    }

    /// Every suspended approval, longest waiting first.
    pub fn pending_approvals(&self) -> Vec<PendingApproval> {
        let executions = self.executions.read();
        let mut pending: Vec<PendingApproval> = executions
            .values()
            .filter_map(Execution::pending_approval)
            .collect();
        pending.sort_by(|a, b| a.waiting_since.cmp(&b.waiting_since));
        pending
    }

    // --- Maintenance ---

    pub fn statistics(&self) -> Statistics {
        self.statistics_at(Utc::now())
    }

    pub fn statistics_at(&self, now: DateTime<Utc>) -> Statistics {
        let table = self.flows.read();
        let executions = self.executions.read();
        let active = table.active.and_then(|id| table.flows.get(&id));
        let all: Vec<&Execution> = executions.values().collect();
        Statistics::collect(
            table.flows.values().map(|f| &**f),
            active.map(|f| &**f),
            &all,
            now,
        )
    }

    /// Deletes finished executions that ended more than `older_than` ago.
    ///
    /// With `dry_run` nothing is removed and the count of what would be
    /// removed is returned. Running executions are never touched.
    pub fn cleanup(&self, older_than: Duration, dry_run: bool) -> usize {
        self.cleanup_at(Utc::now(), older_than, dry_run)
    }

    pub fn cleanup_at(&self, now: DateTime<Utc>, older_than: Duration, dry_run: bool) -> usize {
        let cutoff = now - older_than;
        let eligible = |e: &Execution| e.is_finished() && e.ended_at.is_some_and(|t| t < cutoff);

        if dry_run {
            let count = self.executions.read().values().filter(|e| eligible(e)).count();
            debug!(count, %cutoff, "cleanup dry run");
            return count;
        }
        let mut executions = self.executions.write();
        let before = executions.len();
        executions.retain(|_, e| !eligible(&*e));
        let removed = before - executions.len();
        info!(removed, %cutoff, "old executions cleaned up");
        removed
    }

    // --- Persistence ---

    pub fn snapshot(&self) -> Snapshot {
        let table = self.flows.read();
        let executions = self.executions.read();
        let mut flows: Vec<Flow> = table.flows.values().map(|f| (**f).clone()).collect();
        flows.sort_by(|a, b| a.name.cmp(&b.name).then(a.version.cmp(&b.version)));
        let mut executions: Vec<Execution> = executions.values().cloned().collect();
        executions.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Snapshot::new(flows, executions)
    }

    /// Replaces the registry contents with a snapshot.
    pub fn restore(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        snapshot.check()?;
        let mut table = self.flows.write();
        let mut executions = self.executions.write();
        table.active = snapshot
            .flows
            .iter()
            .find(|f| f.status == FlowStatus::Active)
            .map(|f| f.id);
        table.flows = snapshot
            .flows
            .into_iter()
            .map(|f| (f.id, Arc::new(f)))
            .collect();
        *executions = snapshot
            .executions
            .into_iter()
            .map(|e| (e.id, e))
            .collect();
        info!(
            flows = table.flows.len(),
            executions = executions.len(),
            "registry restored"
        );
        Ok(())
    }

    pub fn from_snapshot(config: EngineConfig, snapshot: Snapshot) -> Result<Self, StoreError> {
        let registry = Self::new(config);
        registry.restore(snapshot)?;
        Ok(registry)
    }
}

//! # Ringi - Approval Flow Engine
//!
//! **Ringi** defines and runs versioned approval flows: directed acyclic graphs of
//! start, approval, condition, notification and end nodes that route a request
//! payload (an MPR: priority, budget, department, ...) to a terminal state.
//!
//! ## Core Workflow
//!
//! 1.  **Describe a flow**: write a [`flow::FlowSpec`] (JSON or code) or pick a [`flow::Template`].
//! 2.  **Register it**: the [`registry::FlowRegistry`] builds the graph, compiles every
//!     condition predicate once, and stores it as a Draft version.
//! 3.  **Activate**: activation validates the graph and atomically replaces the single
//!     active flow.
//! 4.  **Execute**: start executions against the active flow. Each one walks the graph,
//!     records a step per node, and suspends on approval nodes until a decision arrives.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ringi::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let registry = FlowRegistry::new(EngineConfig::default());
//!
//!     let flow = registry.create_from_template(Template::Conditional, "MPR Approval", "admin")?;
//!     registry.activate(flow.id, "admin")?;
//!
//!     let payload = Payload::new()
//!         .with("budget_amount", 85000.0)
//!         .with("priority", "urgent");
//!     let execution = registry.start_execution(None, payload)?;
//!
//!     if let Some(pending) = execution.pending_approval() {
//!         println!("-> Waiting on {} at '{}'", pending.role, pending.node);
//!     }
//!
//!     let execution = registry.resume_execution(execution.id, Decision::approve("alice"))?;
//!     println!("-> Execution is {}", execution.status);
//!     for step in &execution.steps {
//!         println!("   {}. {} ({})", step.sequence, step.node, step.kind_name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod compiler;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod execution;
pub mod flow;
pub mod prelude;
pub mod registry;
pub mod store;
pub mod trace;

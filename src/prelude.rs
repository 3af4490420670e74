//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from the ringi crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use ringi::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let registry = FlowRegistry::default();
//! let spec = FlowSpec::from_json(&std::fs::read_to_string("path/to/flow.json")?)?;
//! let flow = registry.create(spec, "admin")?;
//! println!("{}", registry.validate(flow.id)?);
//! # Ok(())
//! # }
//! ```

// Flow definition and lifecycle
pub use crate::flow::{
    EdgeSpec, Flow, FlowBuilder, FlowSpec, FlowStatus, NodeKind, NodeSpec, Template,
    ValidationReport, validate,
};
pub use crate::registry::{ExecutionFilter, FlowFilter, FlowRegistry, Statistics};

// Execution
pub use crate::execution::{
    Decision, Execution, ExecutionEngine, ExecutionStatus, FailureKind, StepOutcome, Verdict,
};

// Evaluation
pub use crate::ast::{Expression, Value};
pub use crate::data::Payload;
pub use crate::evaluator::{ConditionEvaluator, MissingFieldPolicy, RouteDecision};

// Configuration and persistence
pub use crate::config::EngineConfig;
pub use crate::store::Snapshot;

// Error types
pub use crate::error::{BuildError, EvaluationError, ExecutionError, RegistryError, Violation};

// Trace formatting
pub use crate::trace::TraceFormatter;

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

//! Runs payloads through flow versions, one step per visited node.

mod engine;
mod model;

pub use engine::ExecutionEngine;
pub use model::*;

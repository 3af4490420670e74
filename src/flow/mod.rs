//! The flow graph model: typed nodes and guarded edges, plus building and validation.

mod builder;
pub mod definition;
pub mod model;
pub mod parsing;
pub mod templates;
mod validation;

pub use builder::{FlowBuilder, build};
pub use definition::{EdgeSpec, FlowSpec, NodeSpec};
pub use model::*;
pub use templates::Template;
pub use validation::{ValidationReport, validate};

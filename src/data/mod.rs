//! Request payloads: the field values condition predicates read.

mod model;

pub use model::Payload;

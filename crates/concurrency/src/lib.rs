//! Concurrency primitives for the Loam persistence layer
//!
//! Three pieces live here:
//! - [`lane`]: serial execution lanes, the confinement unit for contexts
//! - [`context`]: thread-confined staging areas over the object graph
//! - [`merge`]: the property-level committing-side-wins merge policy

#![warn(missing_docs)]

pub mod context;
pub mod lane;
pub mod merge;

pub use context::{Context, ContextState};
pub use lane::{Job, Lane, LanePool};
